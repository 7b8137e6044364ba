use thiserror::Error;

pub type PredictResult<T> = Result<T, PredictError>;
pub type ParserResult<T> = PredictResult<T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PredictErrorCategory {
    InputValidation,
    IoSystem,
    Computation,
    Internal,
}

impl PredictErrorCategory {
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::InputValidation => 2,
            Self::IoSystem => 3,
            Self::Computation => 4,
            Self::Internal => 5,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputValidation => "InputValidation",
            Self::IoSystem => "IoSystem",
            Self::Computation => "Computation",
            Self::Internal => "Internal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} [{code}] {message}", category.as_str())]
pub struct PredictError {
    category: PredictErrorCategory,
    code: &'static str,
    message: String,
}

impl PredictError {
    pub fn new(
        category: PredictErrorCategory,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code,
            message: message.into(),
        }
    }

    pub fn input_validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PredictErrorCategory::InputValidation, code, message)
    }

    pub fn io_system(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PredictErrorCategory::IoSystem, code, message)
    }

    pub fn computation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PredictErrorCategory::Computation, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(PredictErrorCategory::Internal, code, message)
    }

    pub const fn category(&self) -> PredictErrorCategory {
        self.category
    }

    pub const fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn exit_code(&self) -> i32 {
        self.category.exit_code()
    }

    pub fn diagnostic_line(&self) -> String {
        format!("ERROR: [{}] {}", self.code, self.message)
    }
}
