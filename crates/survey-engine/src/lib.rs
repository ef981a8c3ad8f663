//! A binding, validation and navigation engine for scripted survey definitions.
//!
//! A survey is a tree of groups, questions and answers. Components carry instructions
//! (relevance, validity, computed values, skips, random orders, ...) whose expression
//! text is checked and evaluated by a host-provided [`script::ScriptEngine`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use survey_engine::usecase::{NavigationUseCase, ValidationUseCase};
//!
//! let validation = ValidationUseCase::new(&engine, survey)?.validate()?;
//! let output = NavigationUseCase::new(&validation, NavigationInfo::start())
//!     .with_values(values)
//!     .navigate(&engine, &mut rand::thread_rng())?;
//! println!("{:?}", output.navigation_index);
//! ```
pub mod config;
pub mod dependency;
pub mod error;
pub mod model;
pub mod navigate;
pub mod script;
pub mod sequence;
pub mod usecase;
pub mod validate;

pub use error::{EngineError, Result};
