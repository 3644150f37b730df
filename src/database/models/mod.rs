pub mod content;
pub mod course;
pub mod session;
pub mod user;

pub use content::{SectionContent, MAX_TIME_FOR_TEST, TestAnswer, TestBlock, TestQuestion};
pub use course::{Course, CourseJoinRequest, CourseRoleRow, CourseSection};
pub use session::{TestSession, TestUserAnswer};
pub use user::User;
