use crate::middleware::ClientCtx;
use askama_actix::Template;

const PAGINATOR_LOOK_AHEAD: i32 = 2;

/// Windowed page navigation: first page, a window around the cursor, last
/// page, with gaps collapsed.
#[derive(Debug)]
pub struct Paginator {
    /// Prefix every page link is appended to; ends in `?` or `&`.
    pub base_url: String,
    pub this_page: i32,
    pub page_count: i32,
}

#[derive(Template)]
#[template(path = "util/paginator.html")]
struct PaginatorTemplate<'a> {
    paginator: &'a Paginator,
}

impl Paginator {
    pub fn new(base_url: String, this_page: i32, page_count: i32) -> Self {
        Self {
            base_url,
            this_page: this_page.clamp(1, page_count.max(1)),
            page_count: page_count.max(1),
        }
    }

    pub fn has_pages(&self) -> bool {
        self.page_count > 1
    }

    pub fn is_current_page(&self, page: &i32) -> bool {
        *page == self.this_page
    }

    pub fn url_for(&self, page: &i32) -> String {
        format!("{}page={}", self.base_url, page)
    }

    /// Page entries to render; `None` is a collapsed gap.
    pub fn pages(&self) -> Vec<Option<i32>> {
        let mut entries = Vec::new();
        let mut last_emitted = 0;

        for page in 1..=self.page_count {
            let in_window = (page - self.this_page).abs() <= PAGINATOR_LOOK_AHEAD;
            if page == 1 || page == self.page_count || in_window {
                if page > last_emitted + 1 {
                    entries.push(None);
                }
                entries.push(Some(page));
                last_emitted = page;
            }
        }

        entries
    }

    pub fn as_html(&self) -> String {
        if !self.has_pages() {
            return String::new();
        }
        let mut buffer = String::new();
        let template = PaginatorTemplate { paginator: self };
        if template.render_into(&mut buffer).is_err() {
            "[Paginator Util Error]".to_owned()
        } else {
            buffer
        }
    }
}

#[derive(Template)]
#[template(path = "create_user.html")]
pub struct CreateUserTemplate {
    pub client: ClientCtx,
    pub errors: Vec<String>,
    pub username: String,
    pub email: String,
}
