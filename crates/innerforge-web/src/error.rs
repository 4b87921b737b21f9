use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use innerforge_core::ForgeError;

/// Application error type that renders as an HTML error page.
///
/// Domain errors keep their meaning across the boundary: `NotFound` becomes
/// a 404 page and `PermissionDenied` a 403; everything else is a 500 with
/// the error chain.
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<ForgeError>() {
            Some(ForgeError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(ForgeError::PermissionDenied(_)) => StatusCode::FORBIDDEN,
            Some(ForgeError::Precondition(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("web error: {:#}", self.0);
        } else {
            tracing::debug!("request error ({status}): {:#}", self.0);
        }

        match status {
            StatusCode::NOT_FOUND => {
                status_page(status, "404", "That page doesn't exist.").into_response()
            }
            StatusCode::FORBIDDEN => forbidden().into_response(),
            _ => {
                let body = format!(
                    r#"<!doctype html>
<html><head><title>Error</title>
<style>body{{font-family:system-ui;background:#1a1a2e;color:#e0e0e0;display:flex;justify-content:center;align-items:center;height:100vh;margin:0}}
.err{{background:#16213e;padding:2rem;border-radius:8px;border-left:4px solid #e74c3c;max-width:600px}}
h1{{color:#e74c3c;margin-top:0}}pre{{white-space:pre-wrap;color:#aaa}}</style>
</head><body><div class="err"><h1>Something went wrong</h1><pre>{}</pre>
<p><a href="/" style="color:#3498db">Back to home</a></p></div></body></html>"#,
                    html_escape(&format!("{:#}", self.0))
                );
                (status, Html(body)).into_response()
            }
        }
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Minimal dark status page used for 404s and the route fallback.
pub fn status_page(status: StatusCode, heading: &str, message: &str) -> (StatusCode, Html<String>) {
    let body = format!(
        r#"<!doctype html>
<html><head><title>{heading} — Innerforge</title>
<style>body{{font-family:system-ui;background:#0f0f1a;color:#e0e0e0;display:flex;justify-content:center;align-items:center;height:100vh;margin:0}}
.box{{text-align:center}}
h1{{font-size:4rem;color:#6c63ff;margin:0}}
p{{color:#888;margin:0.5rem 0 1.5rem}}
a{{color:#6c63ff;text-decoration:none;padding:0.5rem 1rem;border:1px solid #2a2a4a;border-radius:8px}}
a:hover{{border-color:#6c63ff;background:rgba(108,99,255,0.1)}}</style>
</head><body><div class="box"><h1>{heading}</h1><p>{message}</p><a href="/">Back to home</a></div></body></html>"#,
    );
    (status, Html(body))
}

/// The page shown when a signed-in user lacks staff rights.
pub fn forbidden() -> (StatusCode, Html<String>) {
    status_page(
        StatusCode::FORBIDDEN,
        "403",
        "This area is for staff accounts.",
    )
}

pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
