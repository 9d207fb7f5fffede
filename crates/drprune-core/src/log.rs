use std::fmt;

/// Structured logging context threaded explicitly through calls.
///
/// Fields are attached with [`LogCtx::with`], which returns a new context and leaves the
/// receiver untouched. The context renders as `key=value` pairs and is emitted as the
/// `ctx` field of tracing events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogCtx {
    fields: Vec<(&'static str, String)>,
}

impl LogCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// New context with `key=value` appended; a repeated key shadows the earlier value.
    #[must_use]
    pub fn with(&self, key: &'static str, value: impl fmt::Display) -> LogCtx {
        let mut fields = self.fields.clone();
        fields.retain(|(k, _)| *k != key);
        fields.push((key, value.to_string()));
        LogCtx { fields }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for LogCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}
