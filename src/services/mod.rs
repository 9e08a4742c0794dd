pub mod cursor;
pub mod dispatcher;
pub mod extractor;
pub mod ledger;
pub mod pipeline;
pub mod providers;
pub mod resolver;
pub mod source;

pub use cursor::*;
pub use dispatcher::*;
pub use extractor::*;
pub use ledger::*;
pub use pipeline::*;
pub use providers::*;
pub use resolver::*;
pub use source::*;
