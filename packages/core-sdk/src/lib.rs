pub mod config;
pub mod duration;
pub mod error;
pub mod hashing;
pub mod messages;
pub mod modelfile;
pub mod models;
pub mod nlp;
pub mod telemetry;
pub mod templates;
pub mod validation;

pub use error::{Error, Result};

/**
 * \brief SDK 预导入集合，方便外部引用常用模块。
 */
pub mod prelude {
    pub use crate::config;
    pub use crate::duration;
    pub use crate::hashing;
    pub use crate::messages;
    pub use crate::modelfile;
    pub use crate::models;
    pub use crate::nlp;
    pub use crate::telemetry;
    pub use crate::templates;
    pub use crate::validation;
}
