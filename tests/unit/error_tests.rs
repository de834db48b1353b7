// Error classification shared by the HTTP layer and metrics

use rstest::rstest;
use std::time::Duration;

use pdfgate::error::ConvertError;
use pdfgate::metrics::OutcomeStatus;

fn rate_limited() -> ConvertError {
    ConvertError::RateLimited {
        client_id: "10.0.0.1".to_string(),
        retry_after: Duration::from_secs(12),
    }
}

#[rstest]
#[case(ConvertError::Validation { size: 11, limit: 10 }, 413, "validation_error", true)]
#[case(rate_limited(), 429, "rate_limited", true)]
#[case(ConvertError::Timeout { timeout: Duration::from_secs(30) }, 504, "timeout", false)]
#[case(ConvertError::Render("exit status 1".to_string()), 500, "render_error", false)]
fn test_error_classification(
    #[case] err: ConvertError,
    #[case] status: u16,
    #[case] code: &str,
    #[case] client_fault: bool,
) {
    assert_eq!(err.status_code(), status);
    assert_eq!(err.code(), code);
    assert_eq!(err.is_client_error(), client_fault);
    assert_eq!(OutcomeStatus::from(&err).as_str(), code);
}

#[test]
fn test_error_messages_carry_details() {
    let validation = ConvertError::Validation {
        size: 11534336,
        limit: 10485760,
    };
    assert_eq!(
        validation.to_string(),
        "HTML input of 11534336 bytes exceeds the 10485760 byte limit"
    );

    assert!(rate_limited().to_string().contains("10.0.0.1"));

    let timeout = ConvertError::Timeout {
        timeout: Duration::from_millis(2500),
    };
    assert_eq!(timeout.to_string(), "Rendering did not complete within 2.5s");

    let render = ConvertError::Render("no such font".to_string());
    assert_eq!(render.to_string(), "Error converting HTML to PDF: no such font");
}
