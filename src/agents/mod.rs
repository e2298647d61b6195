pub mod component;
pub mod project_scanner;
pub mod update_controller;
pub mod version_control;

pub use component::{Component, ComponentAgent};
pub use project_scanner::{ProjectInfo, ProjectScannerAgent};
pub use update_controller::{ActOutcome, Delivery, UpdateController};
pub use version_control::{Git, VersionControlAgent};
