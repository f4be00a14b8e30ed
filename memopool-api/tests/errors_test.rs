use memopool_api::errors::ConstructionError;
use std::error::Error;
use anyhow::anyhow;

#[cfg(test)]
mod tests {
    use super::*;

    // Test plain construction failure
    #[test]
    fn test_failed_error() {
        let error = ConstructionError::failed("script has a syntax error");

        assert_eq!(
            error.to_string(),
            "Construction failed: script has a syntax error"
        );
        assert!(error.source().is_none());
    }

    // Test construction failure carrying a library error
    #[test]
    fn test_source_error_keeps_context_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "document.json");
        let error = ConstructionError::from(anyhow::Error::new(io).context("loading document"));

        let message = error.to_string();
        assert!(message.starts_with("Construction failed: loading document"));
        assert!(message.contains("document.json"));
    }

    #[test]
    fn test_question_mark_converts_anyhow() {
        fn build() -> Result<u32, ConstructionError> {
            let parsed: u32 = "not a number".parse().map_err(|e| anyhow!("bad key: {}", e))?;
            Ok(parsed)
        }

        match build() {
            Err(ConstructionError::Source(e)) => assert!(e.to_string().starts_with("bad key")),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
