pub mod error;
pub mod export;
pub mod index;
pub mod login;
pub mod logout;
pub mod polls;
pub mod results;
pub mod vote;

/// Configures the web app by adding services from each web file.
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Descending order. Order is important.
    // Route resolution will stop at the first match, so the static
    // /polls/create route must register before /polls/{poll_id}.
    index::configure(conf);
    login::configure(conf);
    logout::configure(conf);
    polls::configure(conf);
    export::configure(conf);
    results::configure(conf);
    vote::configure(conf);

    conf.service(crate::create_user::create_user_get)
        .service(crate::create_user::create_user_post);
}
