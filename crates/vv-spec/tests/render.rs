use std::collections::BTreeSet;
use std::fs;

use serde_json::{Value, json};

use vv_spec::{
    FlowStage, HandlebarsRenderer, JsonRenderer, MemoryStore, RawFields, Renderer, Response,
    SpeciesCatalog, ValidationError, ViewName, WizardConfig, WizardController, WizardService,
    error_summary, species_view,
};

fn fixture(name: &str) -> &'static str {
    match name {
        "cattle_catalog" => include_str!("../tests/fixtures/cattle_catalog.json"),
        _ => panic!("unknown fixture {}", name),
    }
}

fn catalog() -> SpeciesCatalog {
    SpeciesCatalog::from_json(fixture("cattle_catalog")).expect("catalog")
}

fn text_service() -> WizardService<MemoryStore, HandlebarsRenderer> {
    let controller = WizardController::new(catalog(), MemoryStore::new(), WizardConfig::default());
    WizardService::new(controller, HandlebarsRenderer::new().expect("templates"))
}

fn json_service() -> WizardService<MemoryStore, JsonRenderer> {
    let controller = WizardController::new(catalog(), MemoryStore::new(), WizardConfig::default());
    WizardService::new(controller, JsonRenderer)
}

fn body(response: &Response) -> &str {
    match response {
        Response::Page { body, .. } => body,
        Response::Redirect { to } => panic!("expected a page, got redirect to {to}"),
    }
}

fn page_data(response: &Response) -> Value {
    let parsed: Value = serde_json::from_str(body(response)).expect("json body");
    parsed["data"].clone()
}

#[test]
fn error_summary_links_each_field() {
    let errors = vec![ValidationError::new(
        "cattle_bulls",
        "Enter the number of bulls",
        "missing",
    )];
    let summary = error_summary(&errors);
    assert_eq!(summary["title"], "There is a problem");
    assert_eq!(summary["items"][0]["href"], "#cattle_bulls");
    assert!(error_summary(&[]).is_null());
}

#[test]
fn species_view_marks_checked_species() {
    let checked: BTreeSet<String> = ["sheep".to_string()].into_iter().collect();
    let data = species_view(&WizardConfig::default(), &catalog(), &checked, &[]);
    assert_eq!(data["page_title"], "Which animals do you have?");
    assert_eq!(data["species"][0]["checked"], false);
    assert_eq!(data["species"][1]["checked"], true);
}

#[test]
fn text_walkthrough_renders_every_step() {
    let service = text_service();
    let (flow_id, start) = service.start().expect("start");
    assert_eq!(start.view(), ViewName::Start);
    assert!(body(&start).contains("Register animals for vet visits"));

    let species = service.species_page(&flow_id).expect("species page");
    assert!(body(&species).contains("[ ] Cattle (cattle)"));

    let redirect = service
        .submit_species(&flow_id, &["cattle"])
        .expect("submit species");
    assert_eq!(
        redirect,
        Response::Redirect {
            to: ViewName::AnimalCounts
        }
    );

    let counts = service.counts_page(&flow_id).expect("counts page");
    assert!(body(&counts).contains("Dairy cows [cattle_dairy_cows]"));

    let mut fields = RawFields::new();
    fields.insert("cattle_dairy_cows".into(), "10".into());
    fields.insert("cattle_bulls".into(), "2".into());
    let redirect = service.submit_counts(&flow_id, &fields).expect("submit");
    assert!(redirect.is_redirect());
    assert_eq!(redirect.view(), ViewName::Confirmation);

    let confirmation = service.confirmation(&flow_id).expect("confirmation");
    let text = body(&confirmation);
    assert!(text.contains("Your reference number"));
    assert!(text.contains("Cattle - Dairy cows: 10"));
    assert!(text.contains("Total animals: 12"));
}

#[test]
fn rejected_counts_echo_values_and_inline_errors() {
    let service = json_service();
    let (flow_id, _) = service.start().expect("start");
    service
        .submit_species(&flow_id, &["cattle"])
        .expect("submit species");

    let mut fields = RawFields::new();
    fields.insert("cattle_dairy_cows".into(), "10".into());
    fields.insert("cattle_bulls".into(), "lots".into());
    let response = service.submit_counts(&flow_id, &fields).expect("submit");
    assert_eq!(response.view(), ViewName::AnimalCounts);

    let data = page_data(&response);
    let subs = &data["species"][0]["subcategories"];
    assert_eq!(subs[0]["value"], "10");
    assert!(subs[0]["error"].is_null());
    assert_eq!(subs[1]["value"], "lots");
    assert_eq!(subs[1]["error"], "Number of bulls must be a whole number");
    assert_eq!(
        data["error_summary"]["items"],
        json!([{ "text": "Number of bulls must be a whole number", "href": "#cattle_bulls" }])
    );
}

#[test]
fn rejected_species_renders_same_page_with_error() {
    let service = text_service();
    let (flow_id, _) = service.start().expect("start");
    let empty: [&str; 0] = [];
    let response = service.submit_species(&flow_id, &empty).expect("submit");
    assert_eq!(response.view(), ViewName::SpeciesSelection);
    let text = body(&response);
    assert!(text.contains("There is a problem"));
    assert!(text.contains("Select at least one species of animal you have (#species)"));
}

#[test]
fn confirmation_out_of_sequence_redirects_and_resets() {
    let service = text_service();
    let (flow_id, _) = service.start().expect("start");
    service.submit_species(&flow_id, &["sheep"]).expect("submit");

    let response = service.confirmation(&flow_id).expect("confirmation");
    assert_eq!(
        response,
        Response::Redirect {
            to: ViewName::SpeciesSelection
        }
    );
    let state = service.controller().flow(&flow_id).expect("flow kept");
    assert_eq!(state.stage, FlowStage::SpeciesSelection);
    assert!(state.selected_species.is_empty());
}

#[test]
fn missing_flow_redirects_to_first_steps() {
    let service = text_service();
    let (flow_id, _) = service.start().expect("start");
    service.submit_species(&flow_id, &["sheep"]).expect("submit");
    let mut fields = RawFields::new();
    fields.insert("sheep_ewes".into(), "1".into());
    fields.insert("sheep_rams".into(), "1".into());
    service.submit_counts(&flow_id, &fields).expect("counts");
    service.confirmation(&flow_id).expect("first confirmation");

    assert_eq!(
        service.confirmation(&flow_id).expect("again"),
        Response::Redirect {
            to: ViewName::SpeciesSelection
        }
    );
    assert_eq!(
        service.species_page(&flow_id).expect("species"),
        Response::Redirect {
            to: ViewName::Start
        }
    );
    assert_eq!(
        service.counts_page(&flow_id).expect("counts"),
        Response::Redirect {
            to: ViewName::SpeciesSelection
        }
    );
}

#[test]
fn counts_page_without_selection_redirects() {
    let service = text_service();
    let (flow_id, _) = service.start().expect("start");
    assert_eq!(
        service.counts_page(&flow_id).expect("counts"),
        Response::Redirect {
            to: ViewName::SpeciesSelection
        }
    );
}

#[test]
fn template_directory_overrides_builtin_views() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("start.hbs"),
        "<h1>{{service_name}}</h1><p>{{flow_id}}</p>",
    )
    .expect("write template");

    let renderer = HandlebarsRenderer::new()
        .expect("templates")
        .with_template_dir(dir.path())
        .expect("overrides")
        .escape_html();
    let rendered = renderer
        .render(
            ViewName::Start,
            &json!({ "service_name": "Pigs & poultry", "flow_id": "abc" }),
        )
        .expect("render");
    assert_eq!(rendered, "<h1>Pigs &amp; poultry</h1><p>abc</p>");

    let untouched = renderer
        .render(
            ViewName::Confirmation,
            &json!({ "page_title": "Done", "reference_number": "VV-1", "summary": [], "total": 0 }),
        )
        .expect("builtin confirmation");
    assert!(untouched.contains("VV-1"));
}

#[test]
fn json_renderer_wraps_view_and_data() {
    let rendered = JsonRenderer
        .render(ViewName::AnimalCounts, &json!({ "species": [] }))
        .expect("render");
    let parsed: Value = serde_json::from_str(&rendered).expect("json");
    assert_eq!(parsed["view"], "animal-counts");
    assert_eq!(parsed["data"]["species"], json!([]));
}

#[test]
fn oversized_total_stays_on_counts_page() {
    let service = text_service();
    let (flow_id, _) = service.start().expect("start");
    service.submit_species(&flow_id, &["sheep"]).expect("submit");

    let mut fields = RawFields::new();
    fields.insert("sheep_ewes".into(), u64::MAX.to_string());
    fields.insert("sheep_rams".into(), "1".into());
    let response = service.submit_counts(&flow_id, &fields).expect("submit");
    assert_eq!(response.view(), ViewName::AnimalCounts);
    assert!(body(&response).contains("Total number of animals is too large (#sheep_rams)"));

    fields.insert("sheep_rams".into(), "0".into());
    let redirect = service.submit_counts(&flow_id, &fields).expect("resubmit");
    assert_eq!(redirect.view(), ViewName::Confirmation);
    let confirmation = service.confirmation(&flow_id).expect("confirmation");
    assert!(body(&confirmation).contains(&format!("Total animals: {}", u64::MAX)));
}
