//! The few HTML pages the browser side of the login flow needs.

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n\
         <body>\n<main>\n<h1>{title}</h1>\n{body}\n</main>\n</body>\n</html>\n"
    )
}

pub fn login_form(next: &str) -> String {
    let action = format!("/login?next={}", urlencoding::encode(next));

    layout(
        "Log in",
        &format!(
            "<form method=\"post\" action=\"{}\">\n\
             <label>Email <input type=\"email\" name=\"email\" required></label>\n\
             <label>Password <input type=\"password\" name=\"password\" required></label>\n\
             <button type=\"submit\">Log in</button>\n\
             </form>\n\
             <p>New email addresses are registered automatically.</p>",
            escape_html(&action)
        ),
    )
}

pub fn home(email: &str) -> String {
    layout("Welcome", &format!("<p>Logged in as {}.</p>", escape_html(email)))
}

pub fn cli_login_approved() -> String {
    layout(
        "CLI login approved",
        "<p>Your terminal is now logged in. You can close this tab.</p>",
    )
}

/// Escape text for HTML bodies and double-quoted attributes. The pages are built with `format!`,
/// so every user-supplied value goes through here.
fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
