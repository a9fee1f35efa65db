use once_cell::sync::Lazy;
use regex::Regex;

// SSN runs before phone: both are digit triples with separators, and the
// phone pattern would otherwise eat the first half of an SSN.
static SSN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{3}-\d{2}-\d{4}\b").unwrap());

static PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(?\b\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}\b").unwrap());

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

/// Scrub emails, phone numbers and SSNs from free text before it leaves
/// the process boundary (model payloads, cache entries).
///
/// Pure and idempotent: the replacement tokens contain no digits or `@`,
/// so a second pass finds nothing to replace.
pub fn redact(text: &str) -> String {
    let text = EMAIL.replace_all(text, "[EMAIL]");
    let text = SSN.replace_all(&text, "[SSN]");
    let text = PHONE.replace_all(&text, "[PHONE]");
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_emails() {
        assert_eq!(
            redact("reach me at jane.doe+leads@example.com anytime"),
            "reach me at [EMAIL] anytime"
        );
    }

    #[test]
    fn redacts_phone_variants() {
        assert_eq!(redact("call 555-867-5309"), "call [PHONE]");
        assert_eq!(redact("call 555.867.5309"), "call [PHONE]");
        assert_eq!(redact("call (555) 867-5309"), "call [PHONE]");
        assert_eq!(redact("call 5558675309"), "call [PHONE]");
    }

    #[test]
    fn redacts_ssn_not_as_phone() {
        assert_eq!(redact("ssn 123-45-6789 on file"), "ssn [SSN] on file");
    }

    #[test]
    fn redaction_is_idempotent() {
        let samples = [
            "email a@b.co phone 555-867-5309 ssn 123-45-6789",
            "already [EMAIL] and [PHONE] and [SSN]",
            "no pii here, just a tough seller call",
        ];
        for s in samples {
            let once = redact(s);
            assert_eq!(redact(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn plain_text_unchanged() {
        let text = "buyer went quiet after the inspection, following up friday";
        assert_eq!(redact(text), text);
    }
}
