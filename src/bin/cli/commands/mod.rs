pub mod block;
pub mod export;
pub mod folder;
pub mod list;
pub mod new;
pub mod note;
pub mod show;
pub mod sync;
pub mod tree;
