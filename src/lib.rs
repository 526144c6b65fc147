pub mod browser;
pub mod config;
pub mod element;
pub mod error;
pub mod evidence;
pub mod field;
pub mod filler;
pub mod locator;
pub mod page;
pub mod run;
pub mod selector;
pub mod surface;
pub mod verifier;
pub mod wait;

pub use browser::IntakeBrowser;
pub use config::{BrowserConfig, RunConfig, Timing};
pub use error::{Error, Result};
pub use field::{intake_fields, DeclaredKind, FieldKind, FieldSpec, WidgetHandle};
pub use filler::{FieldFiller, FillOutcome};
pub use locator::FieldLocator;
pub use page::Page;
pub use run::{run_intake, RunReport};
pub use surface::{ElementRef, FormField, FormSurface};
pub use verifier::{SubmissionResult, SubmissionStatus, SubmissionVerifier};
