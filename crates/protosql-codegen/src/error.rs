use protosql_descriptor::DescriptorError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unknown generator parameter `{0}`")]
    UnknownParameter(String),

    #[error("parameter `{key}`: {reason}")]
    InvalidParameter { key: String, reason: String },

    #[error("template `{template}`: unknown placeholder `{{{placeholder}}}`")]
    Template {
        template: String,
        placeholder: String,
    },

    #[error("file `{0}` is not part of the descriptor set")]
    UnknownFile(String),

    #[error("routine `{name}` is generated for both {first} and {second}")]
    DuplicateRoutine {
        name: String,
        first: String,
        second: String,
    },

    #[error("type `{0}` is not in the descriptor set")]
    UnknownType(String),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Runtime(#[from] protosql_runtime::Error),

    #[error("failed to render output: {0}")]
    Render(#[from] std::fmt::Error),
}

pub type Result<T> = std::result::Result<T, CodegenError>;
