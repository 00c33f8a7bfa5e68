//! Error-page handlers registered through `ErrorHandlers` in `main`.
//!
//! Store failures reach these as opaque 500s; whatever detail exists has
//! already been logged server-side.

use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result};

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_page(res, "400 Bad Request", "The request could not be understood.")
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_page(
        res,
        "404 Not Found",
        "The page you requested could not be found.",
    )
}

pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    error_page(
        res,
        "500 Internal Server Error",
        "Something went wrong on our end. Please try again.",
    )
}

fn error_page<B>(
    res: ServiceResponse<B>,
    title: &str,
    message: &str,
) -> Result<ErrorHandlerResponse<B>> {
    let (req, res) = res.into_parts();
    let body = format!(
        "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <title>{title}</title></head><body>\
         <h1>{title}</h1><p>{message}</p>\
         <p><a href=\"/\">Back to polls</a></p>\
         </body></html>",
        title = title,
        message = message,
    );

    let new_res = HttpResponse::build(res.status())
        .content_type("text/html; charset=utf-8")
        .body(body);

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, new_res).map_into_right_body(),
    ))
}
