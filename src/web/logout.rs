use crate::session;
use actix_web::{get, Error, HttpResponse};

pub(super) fn configure(conf: &mut actix_web::web::ServiceConfig) {
    conf.service(view_logout);
}

#[get("/logout")]
pub async fn view_logout(cookies: actix_session::Session) -> Result<HttpResponse, Error> {
    session::log_out(&cookies);

    Ok(HttpResponse::Found()
        .append_header(("Location", "/"))
        .finish())
}
