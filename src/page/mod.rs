pub mod archived;
pub mod click;
pub mod cosmetic;
pub mod dom;
pub mod feedback;
pub mod guard;
pub mod observer;
