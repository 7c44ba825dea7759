//! Pagination context in the shape of the host console's change list.

use crate::facets::PAGE_VAR;
use crate::querystring::{reconcile, QueryParams};
use serde::Serialize;

/// Page count at or below which every page is listed.
const SHOW_ALL_BELOW: usize = 10;
const ON_EACH_SIDE: usize = 3;
const ON_ENDS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageLink {
    Page {
        /// 0-based, as sent in `p`
        number: usize,
        /// 1-based, for display
        label: usize,
        link: String,
        current: bool,
    },
    Gap,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangeList {
    /// 0-based current page
    pub page_num: usize,
    pub result_count: usize,
    pub num_pages: usize,
    pub multi_page: bool,
    pub can_show_all: bool,
    pub show_all: bool,
    pub pages: Vec<PageLink>,
}

impl ChangeList {
    /// `page_number` is the paginator's 1-based number; `params` are the raw
    /// request parameters the page links are built from.
    pub fn new(
        params: &QueryParams,
        page_number: usize,
        num_pages: usize,
        result_count: usize,
        per_page: usize,
    ) -> Self {
        let page_num = page_number.saturating_sub(1);
        let pages = page_window(page_num, num_pages)
            .into_iter()
            .map(|slot| match slot {
                Some(number) => PageLink::Page {
                    number,
                    label: number + 1,
                    link: page_link(params, number),
                    current: number == page_num,
                },
                None => PageLink::Gap,
            })
            .collect();
        Self {
            page_num,
            result_count,
            num_pages,
            multi_page: result_count > per_page,
            can_show_all: false,
            show_all: false,
            pages,
        }
    }
}

fn page_link(params: &QueryParams, number: usize) -> String {
    let number = number.to_string();
    reconcile(params, &[(PAGE_VAR, Some(number.as_str()))], &[])
}

/// 0-based page numbers to list, `None` marking an elided run.
///
/// Short ranges are listed in full. Longer ones keep the first and last
/// [`ON_ENDS`] pages and [`ON_EACH_SIDE`] pages around the current one.
pub fn page_window(page_num: usize, num_pages: usize) -> Vec<Option<usize>> {
    if num_pages <= SHOW_ALL_BELOW {
        return (0..num_pages).map(Some).collect();
    }
    let mut window = Vec::new();
    if page_num > ON_EACH_SIDE + ON_ENDS {
        window.extend((0..ON_ENDS).map(Some));
        window.push(None);
        window.extend((page_num - ON_EACH_SIDE..=page_num).map(Some));
    } else {
        window.extend((0..=page_num).map(Some));
    }
    if page_num + ON_EACH_SIDE + ON_ENDS + 1 < num_pages {
        window.extend((page_num + 1..=page_num + ON_EACH_SIDE).map(Some));
        window.push(None);
        window.extend((num_pages - ON_ENDS..num_pages).map(Some));
    } else {
        window.extend((page_num + 1..num_pages).map(Some));
    }
    window
}
