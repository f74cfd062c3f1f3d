//! Rendering of kernel-reported errors into cell outputs.

use cellbridge_core::kernel::ExecutionError;
use cellbridge_core::notebook::{CellOutput, MimetypeBundle};
use serde_json::{Value, json};

/// Output type used for rendered execution errors.
pub const ERROR_OUTPUT_TYPE: &str = "error";

/// MIME type carrying the structured error alongside the text rendering.
pub const ERROR_MIMETYPE: &str = "application/vnd.cellbridge.error+json";

/// Build the output shown for an error raised by user code.
///
/// The `text/plain` rendering is `Name: message` followed by the traceback
/// lines; the structured form keeps the three parts separate.
#[must_use]
pub fn create_error_output(error: &ExecutionError) -> CellOutput {
    let mut text = format!("{}: {}", error.name, error.message);
    for line in &error.traceback {
        text.push('\n');
        text.push_str(line);
    }

    let mut bundle = MimetypeBundle::new();
    let _ = bundle.insert("text/plain".to_string(), Value::String(text));
    let _ = bundle.insert(
        ERROR_MIMETYPE.to_string(),
        json!({
            "name": error.name,
            "message": error.message,
            "traceback": error.traceback,
        }),
    );

    CellOutput {
        output_type: ERROR_OUTPUT_TYPE.to_string(),
        mimetype_bundle: bundle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_name_message_and_traceback() {
        let output = create_error_output(&ExecutionError {
            name: "ZeroDivisionError".into(),
            message: "division by zero".into(),
            traceback: vec!["  File \"<cell>\", line 1".into(), "    1/0".into()],
        });
        assert_eq!(output.output_type, "error");
        assert_eq!(
            output.mimetype_bundle["text/plain"],
            "ZeroDivisionError: division by zero\n  File \"<cell>\", line 1\n    1/0"
        );
        assert_eq!(output.mimetype_bundle[ERROR_MIMETYPE]["name"], "ZeroDivisionError");
        assert_eq!(output.mimetype_bundle[ERROR_MIMETYPE]["traceback"][1], "    1/0");
    }

    #[test]
    fn renders_without_traceback() {
        let output = create_error_output(&ExecutionError {
            name: "KeyboardInterrupt".into(),
            message: String::new(),
            traceback: vec![],
        });
        assert_eq!(output.mimetype_bundle["text/plain"], "KeyboardInterrupt: ");
    }
}
