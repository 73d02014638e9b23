//! Alert message formatting.

/// What a single alert message reports.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlertContext {
    pub region: String,
    pub count: usize,
    pub threshold: usize,
}

pub fn subject(alert: &AlertContext) -> String {
    format!("CRITICAL STAMPEDE ALERT - {}", alert.region)
}

pub fn plain_body(alert: &AlertContext) -> String {
    format!(
        "ALERT: Count {} in {} exceeds threshold!",
        alert.count, alert.region
    )
}

/// HTML alternative addressed to the recipient's team.
pub fn html_body(recipient_label: &str, alert: &AlertContext) -> String {
    format!(
        r#"<html>
    <body>
        <p><strong>🚨 IMMEDIATE ACTION REQUIRED 🚨</strong></p>
        <p>Dear {label} Team,</p>
        <p>Our Stampede Detection System has identified a critical situation.</p>
        <p><strong>⚠️ HIGH CROWD DENSITY ALERT ⚠️</strong></p>
        <ul>
            <li><strong>Area:</strong> {region}</li>
            <li><strong>Current Person Count:</strong> {count} people (Exceeds Threshold of {threshold})</li>
            <li><strong>Status:</strong> Severe Density Alert. Potential Stampede Risk.</li>
        </ul>
        <p>Please dispatch personnel immediately for crowd management.</p>
        <p>Thank you for your prompt response.</p>
        <p>-- Automated Security System</p>
    </body>
</html>
"#,
        label = escape_html(recipient_label),
        region = escape_html(&alert.region),
        count = alert.count,
        threshold = alert.threshold,
    )
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
