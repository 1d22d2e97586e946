use jaq_core::load::{Arena, File, Loader};
use jaq_core::{Compiler, Ctx, RcIter};
use jaq_json::Val;
use serde_json::Value;

use crate::error::{ConfigError, ExtractionError};

/// A jq program checked at configuration time.
///
/// jaq values are not `Send`, so the program is compiled again for each
/// evaluation instead of being kept in compiled form across tasks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    source: String,
}

enum Failure {
    Parse(usize),
    Compile(usize),
    Run(String),
}

impl Failure {
    fn reason(self) -> String {
        match self {
            Self::Parse(count) => format!("{count} parse error(s)"),
            Self::Compile(count) => format!("{count} compile error(s)"),
            Self::Run(reason) => reason,
        }
    }
}

impl Query {
    /// Parses and compiles `source`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidQuery`] if the program does not parse
    /// or uses undefined filters.
    pub fn compile(source: impl Into<String>) -> Result<Self, ConfigError> {
        let source = source.into();
        match evaluate(&source, None) {
            Ok(_) => Ok(Self { source }),
            Err(failure) => Err(ConfigError::InvalidQuery {
                query: source,
                reason: failure.reason(),
            }),
        }
    }

    /// The program text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Runs the program on `input` and returns its first output, or `null`
    /// when it produces none.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Query`] if the program fails on `input`.
    pub fn first(&self, input: &Value) -> Result<Value, ExtractionError> {
        evaluate(&self.source, Some(input.clone())).map_err(|failure| ExtractionError::Query {
            query: self.source.clone(),
            reason: failure.reason(),
        })
    }
}

fn evaluate(code: &str, input: Option<Value>) -> Result<Value, Failure> {
    let loader = Loader::new(jaq_std::defs().chain(jaq_json::defs()));
    let arena = Arena::default();
    let modules = loader
        .load(&arena, File { code, path: () })
        .map_err(|errors| Failure::Parse(errors.len()))?;
    let filter = Compiler::default()
        .with_funs(jaq_std::funs().chain(jaq_json::funs()))
        .compile(modules)
        .map_err(|errors| Failure::Compile(errors.len()))?;

    let Some(input) = input else {
        return Ok(Value::Null);
    };

    let inputs = RcIter::new(core::iter::empty());
    let mut outputs = filter.run((Ctx::new([], &inputs), Val::from(input)));
    match outputs.next() {
        None => Ok(Value::Null),
        Some(Ok(value)) => Ok(Value::from(value)),
        Some(Err(e)) => Err(Failure::Run(format!("{e:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_first_result() {
        let query = Query::compile(".x").unwrap();

        assert_eq!(query.first(&json!({"x": 1})).unwrap(), json!(1));
        assert_eq!(query.first(&json!({"x": "1"})).unwrap(), json!("1"));
    }

    #[test]
    fn test_only_first_of_many() {
        let query = Query::compile(".[]").unwrap();

        assert_eq!(query.first(&json!([3, 4, 5])).unwrap(), json!(3));
    }

    #[test]
    fn test_no_output_is_null() {
        let query = Query::compile("empty").unwrap();

        assert_eq!(query.first(&json!({"x": 1})).unwrap(), Value::Null);
    }

    #[test]
    fn test_std_filters_available() {
        let query = Query::compile(".items | map(.n) | add").unwrap();

        assert_eq!(
            query.first(&json!({"items": [{"n": 1}, {"n": 2}]})).unwrap(),
            json!(3)
        );
    }

    #[test]
    fn test_invalid_query_rejected() {
        assert!(matches!(
            Query::compile(".x | ]"),
            Err(ConfigError::InvalidQuery { .. })
        ));
        assert!(matches!(
            Query::compile("no_such_filter"),
            Err(ConfigError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_runtime_error() {
        let query = Query::compile(".x").unwrap();

        let error = query.first(&json!("text")).unwrap_err();
        assert!(matches!(error, ExtractionError::Query { .. }));
    }
}
