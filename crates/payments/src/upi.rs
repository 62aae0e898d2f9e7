use reqwest::Url;

use inkwell_core::Money;

/// Deep link that opens a UPI app with the payment pre-filled.
///
/// ```text
/// upi://pay?pa=<vpa>&pn=<name>&tr=<ref>&am=<rupees>&cu=INR[&tn=<note>]
/// ```
pub fn upi_intent_url(amount: Money, vpa: &str, name: &str, txn_ref: &str, note: Option<&str>) -> String {
    let mut url = match Url::parse("upi://pay") {
        Ok(url) => url,
        Err(_) => return format!("upi://pay?pa={vpa}&am={}&cu=INR", amount.rupees_string()),
    };
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("pa", vpa)
            .append_pair("pn", name)
            .append_pair("tr", txn_ref)
            .append_pair("am", &amount.rupees_string())
            .append_pair("cu", "INR");
        if let Some(note) = note.filter(|n| !n.is_empty()) {
            query.append_pair("tn", note);
        }
    }
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_intent_with_rupee_amount() {
        let url = upi_intent_url(Money::from_paise(123_405), "inkwell@upi", "Inkwell", "INK42", None);
        assert_eq!(url, "upi://pay?pa=inkwell%40upi&pn=Inkwell&tr=INK42&am=1234.05&cu=INR");
    }

    #[test]
    fn note_is_encoded() {
        let url = upi_intent_url(
            Money::from_rupees(10),
            "shop@upi",
            "Books & More",
            "R1",
            Some("Order #1"),
        );
        assert!(url.contains("pn=Books+%26+More"));
        assert!(url.ends_with("&tn=Order+%231"));
    }
}
