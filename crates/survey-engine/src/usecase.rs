//! Entry points for hosts: validating a survey definition and playing it back.
mod navigation;
mod validation;

pub use navigation::{NavigationOptions, NavigationOutput, NavigationUseCase, PreparedNavigation};
pub use validation::{ValidationOutput, ValidationUseCase};
