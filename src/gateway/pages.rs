//! Inline HTML pages for the login flow.
//!
//! Three pages: login, register, home. Each is a `format!` template over a
//! shared stylesheet with an optional error banner. User-supplied values
//! (name, email) are HTML-escaped before interpolation.

use crate::users::UserRecord;

fn base_style() -> &'static str {
    r#"
    * { margin: 0; padding: 0; box-sizing: border-box; }
    body {
        font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
        background: #f5f5f5; color: #333;
        display: flex; justify-content: center; align-items: center;
        min-height: 100vh; padding: 20px;
    }
    .card {
        background: #fff; border-radius: 16px; padding: 32px;
        max-width: 400px; width: 100%; box-shadow: 0 4px 24px rgba(0,0,0,0.08);
    }
    .logo { text-align: center; margin-bottom: 24px; }
    .logo h1 { font-size: 28px; color: #1a1a2e; }
    .logo p { font-size: 14px; color: #666; margin-top: 4px; }
    .form-group { margin-bottom: 16px; }
    .form-group label { display: block; font-size: 14px; font-weight: 500; margin-bottom: 6px; color: #444; }
    .form-group input {
        width: 100%; padding: 12px 14px; border: 1.5px solid #ddd;
        border-radius: 10px; font-size: 16px; outline: none; transition: border-color 0.2s;
    }
    .form-group input:focus { border-color: #4a6cf7; }
    .btn {
        width: 100%; padding: 14px; border: none; border-radius: 10px;
        font-size: 16px; font-weight: 600; cursor: pointer; transition: background 0.2s;
    }
    .btn-primary { background: #4a6cf7; color: #fff; }
    .btn-primary:hover { background: #3b5de7; }
    .error { background: #fff0f0; color: #d32f2f; padding: 10px 14px; border-radius: 8px; font-size: 13px; margin-bottom: 16px; }
    .link { text-align: center; margin-top: 16px; font-size: 14px; color: #666; }
    .link a { color: #4a6cf7; text-decoration: none; }
    .link a:hover { text-decoration: underline; }
    .profile { margin: 16px 0; }
    .profile dt { font-size: 12px; color: #888; text-transform: uppercase; letter-spacing: 0.5px; margin-top: 12px; }
    .profile dd { font-size: 15px; color: #1a1a2e; margin-top: 2px; word-break: break-all; }
    .session-id { font-family: ui-monospace, 'SF Mono', Menlo, monospace; font-size: 13px; color: #666; }
    "#
}

/// Escape a user-supplied value for interpolation into HTML text or
/// attribute position.
pub fn escape_html(value: &str) -> String {
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

fn error_banner(error: Option<&str>) -> String {
    error
        .map(|e| format!(r#"<div class="error">{}</div>"#, escape_html(e)))
        .unwrap_or_default()
}

pub fn render_login_page(error: Option<&str>) -> String {
    let error_html = error_banner(error);
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Vestibule - Login</title>
<style>{style}</style>
</head><body>
<div class="card">
  <div class="logo"><h1>Vestibule</h1><p>Sign in to continue</p></div>
  {error_html}
  <form method="POST" action="/login">
    <div class="form-group">
      <label>Email</label>
      <input type="email" name="email" required autocomplete="email" placeholder="you@example.com">
    </div>
    <div class="form-group">
      <label>Password</label>
      <input type="password" name="password" required autocomplete="current-password" placeholder="Enter password">
    </div>
    <button type="submit" class="btn btn-primary">Login</button>
  </form>
  <div class="link">
    No account? <a href="/register">Sign Up</a>
  </div>
</div>
</body></html>"#,
        style = base_style(),
    )
}

pub fn render_register_page(error: Option<&str>) -> String {
    let error_html = error_banner(error);
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Vestibule - Register</title>
<style>{style}</style>
</head><body>
<div class="card">
  <div class="logo"><h1>Vestibule</h1><p>Create your account</p></div>
  {error_html}
  <form method="POST" action="/register">
    <div class="form-group">
      <label>Name</label>
      <input type="text" name="name" required autocomplete="name" placeholder="Your name">
    </div>
    <div class="form-group">
      <label>Email</label>
      <input type="email" name="email" required autocomplete="email" placeholder="you@example.com">
    </div>
    <div class="form-group">
      <label>Password</label>
      <input type="password" name="password" required autocomplete="new-password" placeholder="Min 8 characters" minlength="8">
    </div>
    <button type="submit" class="btn btn-primary">Create Account</button>
  </form>
  <div class="link">
    Already have an account? <a href="/login">Login</a>
  </div>
</div>
</body></html>"#,
        style = base_style(),
    )
}

pub fn render_home_page(user: &UserRecord, session_id: &str) -> String {
    let name = escape_html(&user.name);
    let email = escape_html(&user.email);
    let session_id = escape_html(session_id);
    format!(
        r#"<!DOCTYPE html>
<html lang="en"><head>
<meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1">
<title>Vestibule - Home</title>
<style>{style}</style>
</head><body>
<div class="card">
  <div class="logo"><h1>Welcome, {name}</h1><p>You are signed in</p></div>
  <dl class="profile">
    <dt>Name</dt><dd>{name}</dd>
    <dt>Email</dt><dd>{email}</dd>
    <dt>Session</dt><dd class="session-id">{session_id}</dd>
  </dl>
  <div class="link">
    <a href="/logout">Log out</a>
  </div>
</div>
</body></html>"#,
        style = base_style(),
    )
}
