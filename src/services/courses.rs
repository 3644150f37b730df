use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Principal;
use crate::config::CourseConfig;
use crate::database::models::{Course, CourseSection, SectionContent, TestBlock};
use crate::database::{Ordered, Store, StoreTx};
use crate::services::error::{ServiceError, ServiceResult};
use crate::services::ordering::{self, Slot};
use crate::services::permissions::{self, Capability};
use crate::services::roles::effective_course_role;
use crate::services::{load_block, load_course, load_section};
use crate::types::{Accessibility, ContentType, CourseRole};

pub const TITLE_MAX_CHARS: usize = 22;
pub const DESCRIPTION_MAX_CHARS: usize = 100;
pub const DEFAULT_TIME_FOR_TEST: i64 = 600;
pub const DEFAULT_RETRIES: i32 = 1;

const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourse {
    pub title: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub accessibility: Accessibility,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseSettings {
    pub title: Option<String>,
    pub short_description: Option<String>,
    pub accessibility: Option<Accessibility>,
    #[serde(default)]
    pub regenerate_code: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBlock {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub content_type: ContentType,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockPatch {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockSummary {
    pub id: Uuid,
    pub title: String,
    pub content_type: ContentType,
    pub order: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionOutline {
    pub id: Uuid,
    pub section_name: String,
    pub order: i32,
    pub blocks: Vec<BlockSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseInfo {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub short_description: String,
    pub accessibility: Accessibility,
    /// Only shown to co-lecturers and above
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_code: Option<String>,
    pub my_role: Option<CourseRole>,
    pub sections: Vec<SectionOutline>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockView {
    #[serde(flatten)]
    pub block: SectionContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<TestBlock>,
}

/// Lowercase alphanumeric invite code
pub fn generate_join_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

fn validate_title(title: &str) -> ServiceResult<()> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err(ServiceError::field("title", "Title must not be empty"));
    }
    if len > TITLE_MAX_CHARS {
        return Err(ServiceError::field(
            "title",
            format!("Title must be at most {} characters", TITLE_MAX_CHARS),
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> ServiceResult<()> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(ServiceError::field(
            "short_description",
            format!("Description must be at most {} characters", DESCRIPTION_MAX_CHARS),
        ));
    }
    Ok(())
}

/// Courses, their sections and the content blocks inside them
#[derive(Clone)]
pub struct CourseService {
    store: Arc<dyn Store>,
    config: CourseConfig,
}

impl CourseService {
    pub fn new(store: Arc<dyn Store>, config: CourseConfig) -> Self {
        Self { store, config }
    }

    async fn unused_code(&self, tx: &mut dyn StoreTx) -> ServiceResult<String> {
        for _ in 0..16 {
            let code = generate_join_code(self.config.join_code_length);
            if tx.course_by_code(&code).await?.is_none() {
                return Ok(code);
            }
        }
        Err(ServiceError::InconsistentState("could not find a free join code".to_string()))
    }

    /// Create a course owned by `principal`, seeded with one section and one lection
    pub async fn create_course(&self, principal: &Principal, new: NewCourse) -> ServiceResult<Course> {
        if !principal.is_staff() {
            permissions::require_verified_teacher(principal)?;
        }
        validate_title(&new.title)?;
        validate_description(&new.short_description)?;

        let mut tx = self.store.begin().await?;
        let course = Course {
            id: Uuid::new_v4(),
            owner_id: principal.id,
            title: new.title.trim().to_string(),
            short_description: new.short_description,
            course_code: self.unused_code(tx.as_mut()).await?,
            accessibility: new.accessibility,
            created_at: Utc::now(),
        };
        tx.insert_course(&course).await?;

        tx.add_member(course.id, principal.id).await?;
        tx.upsert_course_role(course.id, principal.id, CourseRole::Lecturer).await?;

        let section = CourseSection {
            id: Uuid::new_v4(),
            course_id: course.id,
            section_name: "Section1".to_string(),
            order: 1,
        };
        tx.insert_section(&section).await?;
        tx.insert_block(&SectionContent {
            id: Uuid::new_v4(),
            section_id: section.id,
            title: "block1".to_string(),
            content: String::new(),
            content_type: ContentType::Lection,
            order: 1,
        })
        .await?;
        tx.commit().await?;

        info!("User {} created course {} ({})", principal.username, course.id, course.title);
        Ok(course)
    }

    pub async fn course_info(&self, principal: &Principal, course_id: Uuid) -> ServiceResult<CourseInfo> {
        let mut tx = self.store.begin().await?;
        let course = load_course(tx.as_mut(), course_id).await?;
        let role = effective_course_role(tx.as_mut(), principal, course_id).await?;

        if role.is_none() && course.accessibility != Accessibility::Public {
            warn!("User {} may not view course {}", principal.username, course_id);
            return Err(ServiceError::PermissionDenied);
        }

        let mut sections = Vec::new();
        for section in tx.list_sections(course_id).await? {
            let blocks = tx
                .list_blocks(section.id)
                .await?
                .into_iter()
                .map(|b| BlockSummary {
                    id: b.id,
                    title: b.title,
                    content_type: b.content_type,
                    order: b.order,
                })
                .collect();
            sections.push(SectionOutline {
                id: section.id,
                section_name: section.section_name,
                order: section.order,
                blocks,
            });
        }

        let show_code = permissions::has_capability(role, Capability::CoLecturerOrAbove);
        Ok(CourseInfo {
            id: course.id,
            owner_id: course.owner_id,
            title: course.title,
            short_description: course.short_description,
            accessibility: course.accessibility,
            course_code: show_code.then_some(course.course_code),
            my_role: role,
            sections,
        })
    }

    pub async fn update_settings(
        &self,
        actor: &Principal,
        course_id: Uuid,
        patch: CourseSettings,
    ) -> ServiceResult<Course> {
        let mut tx = self.store.begin().await?;
        let mut course = load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::CoLecturerOrAbove).await?;

        if let Some(title) = patch.title {
            validate_title(&title)?;
            course.title = title.trim().to_string();
        }
        if let Some(description) = patch.short_description {
            validate_description(&description)?;
            course.short_description = description;
        }
        if let Some(accessibility) = patch.accessibility {
            course.accessibility = accessibility;
        }
        if patch.regenerate_code {
            course.course_code = self.unused_code(tx.as_mut()).await?;
        }

        tx.update_course(&course).await?;
        tx.commit().await?;

        info!("User {} updated settings of course {}", actor.username, course_id);
        Ok(course)
    }

    pub async fn delete_course(&self, actor: &Principal, course_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::LecturerOrAbove).await?;

        tx.delete_course(course_id).await?;
        tx.commit().await?;

        info!("User {} deleted course {}", actor.username, course_id);
        Ok(())
    }

    pub async fn create_section(
        &self,
        actor: &Principal,
        course_id: Uuid,
        name: Option<String>,
    ) -> ServiceResult<CourseSection> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::CoLecturerOrAbove).await?;

        let order = ordering::next_order(tx.as_mut(), Ordered::Section, course_id).await?;
        let section_name = match name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => format!("Section{}", order),
        };
        let section = CourseSection {
            id: Uuid::new_v4(),
            course_id,
            section_name,
            order,
        };
        tx.insert_section(&section).await?;
        tx.commit().await?;

        Ok(section)
    }

    pub async fn rename_section(&self, actor: &Principal, section_id: Uuid, name: String) -> ServiceResult<CourseSection> {
        let mut tx = self.store.begin().await?;
        let mut section = load_section(tx.as_mut(), section_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::CoLecturerOrAbove).await?;

        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::field("section_name", "Section name must not be empty"));
        }
        tx.rename_section(section_id, &name).await?;
        tx.commit().await?;

        section.section_name = name;
        Ok(section)
    }

    pub async fn delete_section(&self, actor: &Principal, section_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let section = load_section(tx.as_mut(), section_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::CoLecturerOrAbove).await?;

        tx.delete_section(section_id).await?;
        tx.commit().await?;

        info!("User {} deleted section {}", actor.username, section_id);
        Ok(())
    }

    pub async fn swap_sections(&self, actor: &Principal, first: Uuid, second: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let a = load_section(tx.as_mut(), first).await?;
        let b = load_section(tx.as_mut(), second).await?;
        permissions::require(tx.as_mut(), actor, a.course_id, Capability::CoLecturerOrAbove).await?;

        ordering::swap(
            tx.as_mut(),
            Ordered::Section,
            Slot { id: a.id, parent_id: a.course_id, order: a.order },
            Slot { id: b.id, parent_id: b.course_id, order: b.order },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_sections(&self, actor: &Principal, course_id: Uuid) -> ServiceResult<Vec<CourseSection>> {
        let mut tx = self.store.begin().await?;
        load_course(tx.as_mut(), course_id).await?;
        permissions::require(tx.as_mut(), actor, course_id, Capability::Student).await?;
        Ok(tx.list_sections(course_id).await?)
    }

    /// Append a block to a section. Test blocks get their settings row with defaults.
    pub async fn create_block(&self, actor: &Principal, section_id: Uuid, new: NewBlock) -> ServiceResult<BlockView> {
        let mut tx = self.store.begin().await?;
        let section = load_section(tx.as_mut(), section_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::CoLecturerOrAbove).await?;

        if new.title.trim().is_empty() {
            return Err(ServiceError::field("title", "Title must not be empty"));
        }

        let order = ordering::next_order(tx.as_mut(), Ordered::Block, section_id).await?;
        let block = SectionContent {
            id: Uuid::new_v4(),
            section_id,
            title: new.title.trim().to_string(),
            content: new.content,
            content_type: new.content_type,
            order,
        };
        tx.insert_block(&block).await?;

        let test = match block.content_type {
            ContentType::Test => {
                let test_block = TestBlock {
                    id: Uuid::new_v4(),
                    block_id: block.id,
                    time_for_test: DEFAULT_TIME_FOR_TEST,
                    possible_retries: DEFAULT_RETRIES,
                };
                tx.insert_test_block(&test_block).await?;
                Some(test_block)
            }
            ContentType::Lection => None,
        };
        tx.commit().await?;

        info!("User {} added {} block {} to section {}", actor.username, block.content_type, block.id, section_id);
        Ok(BlockView { block, test })
    }

    pub async fn get_block(&self, actor: &Principal, block_id: Uuid) -> ServiceResult<BlockView> {
        let mut tx = self.store.begin().await?;
        let (block, section) = load_block(tx.as_mut(), block_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::Student).await?;

        let test = tx.test_block_for_block(block.id).await?;
        Ok(BlockView { block, test })
    }

    pub async fn update_block(&self, actor: &Principal, block_id: Uuid, patch: BlockPatch) -> ServiceResult<SectionContent> {
        let mut tx = self.store.begin().await?;
        let (mut block, section) = load_block(tx.as_mut(), block_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::CoLecturerOrAbove).await?;

        if let Some(title) = patch.title {
            if title.trim().is_empty() {
                return Err(ServiceError::field("title", "Title must not be empty"));
            }
            block.title = title.trim().to_string();
        }
        if let Some(content) = patch.content {
            block.content = content;
        }
        tx.update_block(&block).await?;
        tx.commit().await?;

        Ok(block)
    }

    pub async fn delete_block(&self, actor: &Principal, block_id: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let (_, section) = load_block(tx.as_mut(), block_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::CoLecturerOrAbove).await?;

        tx.delete_block(block_id).await?;
        tx.commit().await?;

        info!("User {} deleted block {}", actor.username, block_id);
        Ok(())
    }

    pub async fn swap_blocks(&self, actor: &Principal, first: Uuid, second: Uuid) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        let (a, section) = load_block(tx.as_mut(), first).await?;
        let (b, _) = load_block(tx.as_mut(), second).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::CoLecturerOrAbove).await?;

        ordering::swap(
            tx.as_mut(),
            Ordered::Block,
            Slot { id: a.id, parent_id: a.section_id, order: a.order },
            Slot { id: b.id, parent_id: b.section_id, order: b.order },
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn list_blocks(&self, actor: &Principal, section_id: Uuid) -> ServiceResult<Vec<SectionContent>> {
        let mut tx = self.store.begin().await?;
        let section = load_section(tx.as_mut(), section_id).await?;
        permissions::require(tx.as_mut(), actor, section.course_id, Capability::Student).await?;
        Ok(tx.list_blocks(section_id).await?)
    }
}
