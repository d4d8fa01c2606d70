//! Domain models.

pub mod picture;
pub mod user;

pub use picture::{FreePicture, NewFreePicture, NewUserPicture, UserPicture};
pub use user::{NewUser, User};
