use serde::Serialize;
use tera::{Context, Tera};

use super::domain::LoanApplication;
use super::export::format_created_at;
use super::query::FilterParams;
use super::service::DashboardView;
use super::summary::LoanSummary;
use crate::auth::FlashMessage;

const TEMPLATES: [(&str, &str); 4] = [
    ("base.html", include_str!("../../templates/base.html")),
    ("form.html", include_str!("../../templates/form.html")),
    ("login.html", include_str!("../../templates/login.html")),
    ("dashboard.html", include_str!("../../templates/dashboard.html")),
];

/// Table row with the timestamp already formatted for display.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardRow {
    pub id: i64,
    pub name: String,
    pub cnic: String,
    pub address: String,
    pub district: String,
    pub tehsil: String,
    pub amount: f64,
    pub purpose: String,
    pub contact: String,
    pub created_at: String,
}

impl From<&LoanApplication> for DashboardRow {
    fn from(record: &LoanApplication) -> Self {
        Self {
            id: record.id.0,
            name: record.name.clone(),
            cnic: record.cnic.clone(),
            address: record.address.clone(),
            district: record.district.clone(),
            tehsil: record.tehsil.clone(),
            amount: record.amount,
            purpose: record.purpose.clone(),
            contact: record.contact.clone(),
            created_at: format_created_at(record.created_at),
        }
    }
}

/// Active filter values echoed back into the search form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterView {
    pub search: String,
    pub start_date: String,
    pub end_date: String,
}

impl From<&FilterParams> for FilterView {
    fn from(params: &FilterParams) -> Self {
        Self {
            search: params.search.clone().unwrap_or_default(),
            start_date: params.start_date.clone().unwrap_or_default(),
            end_date: params.end_date.clone().unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct SimplePage<'a> {
    flashes: &'a [FlashMessage],
}

#[derive(Serialize)]
struct DashboardPage<'a> {
    flashes: &'a [FlashMessage],
    rows: Vec<DashboardRow>,
    summary: &'a LoanSummary,
    filters: FilterView,
}

/// Server-side renderer for the intake, login and dashboard pages.
pub struct PageRenderer {
    tera: Tera,
}

impl PageRenderer {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.to_vec())?;
        Ok(Self { tera })
    }

    pub fn intake(&self, flashes: &[FlashMessage]) -> Result<String, tera::Error> {
        self.render("form.html", &SimplePage { flashes })
    }

    pub fn login(&self, flashes: &[FlashMessage]) -> Result<String, tera::Error> {
        self.render("login.html", &SimplePage { flashes })
    }

    pub fn dashboard(
        &self,
        view: &DashboardView,
        flashes: &[FlashMessage],
    ) -> Result<String, tera::Error> {
        let page = DashboardPage {
            flashes,
            rows: view.records.iter().map(DashboardRow::from).collect(),
            summary: &view.summary,
            filters: FilterView::from(&view.filters),
        };
        self.render("dashboard.html", &page)
    }

    fn render<T: Serialize>(&self, template: &str, page: &T) -> Result<String, tera::Error> {
        let context = Context::from_serialize(page)?;
        self.tera.render(template, &context)
    }
}
