use std::io::{self, Write};

use tracing::debug;
use vv_spec::{FlowId, FlowStore, RawFields, Renderer, Response, ViewName, WizardService};

use crate::CliResult;

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Rendered pages and prompts only.
    Clean,
    /// Also flow ids and redirects.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints what the wizard service hands back.
pub struct WizardPresenter {
    verbosity: Verbosity,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    pub fn show_flow(&self, flow_id: &FlowId) {
        if self.verbosity.is_verbose() {
            println!("Flow id: {}", flow_id);
        }
    }

    pub fn show_page(&self, body: &str) {
        println!("{}", body.trim_end());
        println!();
    }

    pub fn show_redirect(&self, to: ViewName) {
        if self.verbosity.is_verbose() {
            println!("-> {}", to);
        }
    }
}

/// Runs one flow on stdin/stdout until the confirmation page is shown.
///
/// Typing `exit` at any prompt aborts the wizard.
pub fn run<S: FlowStore, R: Renderer>(
    service: &WizardService<S, R>,
    presenter: &WizardPresenter,
) -> CliResult<()> {
    let (mut flow_id, start) = service.start()?;
    presenter.show_flow(&flow_id);
    let mut response = start;

    loop {
        response = match response {
            Response::Page { view, body } => {
                presenter.show_page(&body);
                match view {
                    ViewName::Start => service.species_page(&flow_id)?,
                    ViewName::SpeciesSelection => {
                        let keys = prompt_species()?;
                        service.submit_species(&flow_id, &keys)?
                    }
                    ViewName::AnimalCounts => {
                        let fields = prompt_counts(service, &flow_id)?;
                        service.submit_counts(&flow_id, &fields)?
                    }
                    ViewName::Confirmation => return Ok(()),
                }
            }
            Response::Redirect { to } => {
                presenter.show_redirect(to);
                match to {
                    ViewName::Start => {
                        let (fresh, page) = service.start()?;
                        debug!(%fresh, "flow missing; started a new one");
                        flow_id = fresh;
                        presenter.show_flow(&flow_id);
                        page
                    }
                    ViewName::SpeciesSelection => service.species_page(&flow_id)?,
                    ViewName::AnimalCounts => service.counts_page(&flow_id)?,
                    ViewName::Confirmation => service.confirmation(&flow_id)?,
                }
            }
        };
    }
}

fn prompt_species() -> CliResult<Vec<String>> {
    let line = prompt_line("Species keys, separated by commas")?;
    Ok(split_keys(&line))
}

fn split_keys(line: &str) -> Vec<String> {
    line.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Asks for every count field of the species selected on this flow. Blank
/// answers are left out of the submission.
fn prompt_counts<S: FlowStore, R: Renderer>(
    service: &WizardService<S, R>,
    flow_id: &FlowId,
) -> CliResult<RawFields> {
    let controller = service.controller();
    let state = controller.flow(flow_id)?;
    let mut fields = RawFields::new();
    for species in controller.catalog().selected(&state.selected_species) {
        for (sub, key) in species.subcategories.iter().zip(species.count_keys()) {
            let answer = prompt_line(&format!("{} - {}", species.name, sub.name))?;
            if !answer.is_empty() {
                fields.insert(key.field_name(), answer);
            }
        }
    }
    Ok(fields)
}

fn prompt_line(prompt: &str) -> CliResult<String> {
    print!("{}: ", prompt);
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Err("input ended before the wizard finished".into());
    }
    let trimmed = line.trim();
    if trimmed.eq_ignore_ascii_case("exit") {
        return Err("wizard aborted by user".into());
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keys_drops_blanks() {
        assert_eq!(split_keys(" cattle, ,pigs,"), vec!["cattle", "pigs"]);
        assert!(split_keys("").is_empty());
    }

    #[test]
    fn verbosity_follows_flag() {
        assert!(Verbosity::from_verbose(true).is_verbose());
        assert!(!Verbosity::from_verbose(false).is_verbose());
    }
}
