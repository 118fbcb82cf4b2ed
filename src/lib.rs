pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod layout;
pub mod mask;
pub mod pointer;
pub mod session;
pub mod simulate;
pub mod render {
    pub mod loader;
    pub mod reveal;
    pub mod viewer;
}
