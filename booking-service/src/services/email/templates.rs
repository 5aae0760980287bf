//! HTML email templates. Values are HTML-escaped by askama.

use askama::Template;

#[derive(Template)]
#[template(path = "emails/booking_confirmation.html")]
pub struct BookingConfirmation<'a> {
    pub first_name: &'a str,
    pub booking_label: &'a str,
    pub item_name: &'a str,
    pub confirmation_number: &'a str,
    pub start_date: String,
    pub end_date: String,
    pub multi_day: bool,
    pub guests: i32,
    pub total_amount: String,
    pub currency: &'a str,
    pub status: &'a str,
    pub special_requests: &'a str,
    pub site_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/lead_confirmation.html")]
pub struct LeadConfirmation<'a> {
    pub first_name: &'a str,
    pub interest: &'a str,
    pub site_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/guide_ready.html")]
pub struct GuideReady<'a> {
    pub first_name: &'a str,
    pub guide_type: &'a str,
    pub download_url: &'a str,
    pub site_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/admin_notification.html")]
pub struct AdminNotification<'a> {
    pub heading: &'a str,
    pub rows: &'a [(&'a str, String)],
    pub site_url: &'a str,
}

#[derive(Template)]
#[template(path = "emails/test_email.html")]
pub struct TestEmail<'a> {
    pub provider: &'a str,
    pub sent_at: &'a str,
    pub site_url: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guide_template_links_download() {
        let html = GuideReady {
            first_name: "Lee",
            guide_type: "Ultimate Cabo Guide 2025",
            download_url: "https://cabo.is/guides/ultimate.pdf",
            site_url: "https://cabo.is",
        }
        .render()
        .unwrap();
        assert!(html.contains(r#"href="https://cabo.is/guides/ultimate.pdf""#));
        assert!(html.contains("Hi Lee"));
    }

    #[test]
    fn admin_template_lists_rows() {
        let rows = vec![("Email", "a@b.co".to_string()), ("Note", "<b>hi</b>".to_string())];
        let html = AdminNotification {
            heading: "New lead received",
            rows: &rows,
            site_url: "https://cabo.is",
        }
        .render()
        .unwrap();
        assert!(html.contains("a@b.co"));
        assert!(html.contains("&lt;b&gt;hi&lt;/b&gt;"));
    }
}
