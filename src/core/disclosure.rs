use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::engine::{TOTAL_LEAK_CATEGORIES, compute_scoped, leaks};
use super::gate::{Contact, GateValidation, validate};
use super::handoff;
use super::types::{CalculatorResult, InputError, InputField, Inputs, Mode};

pub const EVENT_GATE_VIEWED: &str = "gate_viewed";
pub const EVENT_CONTACT_CAPTURED: &str = "contact_captured";
pub const EVENT_LEAKS_TEASED: &str = "leaks_teased";
pub const EVENT_ALL_LEAKS_CTA: &str = "all_leaks_cta_click";
pub const EVENT_FIX_LEAKS_CTA: &str = "fix_leaks_cta_click";

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Collecting,
    Gating,
    Revealed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Collecting => "collecting",
            Phase::Gating => "gating",
            Phase::Revealed => "revealed",
        })
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Cta {
    Booking,
    Experience,
}

impl Cta {
    fn event_name(self) -> &'static str {
        match self {
            Cta::Booking => EVENT_ALL_LEAKS_CTA,
            Cta::Experience => EVENT_FIX_LEAKS_CTA,
        }
    }

    fn destination(self) -> &'static str {
        match self {
            Cta::Booking => "booking",
            Cta::Experience => "experience",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EditInput { field: InputField, value: u32 },
    RequestCalculation,
    UpdateContact(Contact),
    SubmitContact,
    ClickCta(Cta),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::EditInput { .. } => "edit_input",
            Event::RequestCalculation => "request_calculation",
            Event::UpdateContact(_) => "update_contact",
            Event::SubmitContact => "submit_contact",
            Event::ClickCta(_) => "click_cta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsEvent {
    pub name: &'static str,
    pub properties: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Track(AnalyticsEvent),
    CaptureContact(Contact),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DisclosureError {
    #[error("{event} is not allowed while {phase}")]
    NotAllowed { phase: Phase, event: &'static str },
    #[error(transparent)]
    Input(#[from] InputError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub phase: Phase,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone)]
pub struct Session {
    mode: Mode,
    inputs: Inputs,
    result: CalculatorResult,
    phase: Phase,
    contact: Contact,
    gate_feedback: Option<GateValidation>,
}

impl Session {
    pub fn new(mode: Mode) -> Self {
        Self::with_inputs(mode, Inputs::default())
    }

    pub fn with_inputs(mode: Mode, inputs: Inputs) -> Self {
        Self {
            mode,
            inputs,
            result: compute_scoped(&inputs, mode),
            phase: Phase::Collecting,
            contact: Contact::default(),
            gate_feedback: None,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn inputs(&self) -> &Inputs {
        &self.inputs
    }

    pub fn contact(&self) -> &Contact {
        &self.contact
    }

    /// Latest gate validation, if the visitor has submitted at least once.
    pub fn gate_feedback(&self) -> Option<&GateValidation> {
        self.gate_feedback.as_ref()
    }

    /// The result is kept current in every phase but only shown once revealed.
    pub fn visible_result(&self) -> Option<&CalculatorResult> {
        match self.phase {
            Phase::Revealed => Some(&self.result),
            Phase::Collecting | Phase::Gating => None,
        }
    }

    pub fn handoff_link(&self, base_path: &str) -> Option<String> {
        self.visible_result()
            .map(|result| handoff::handoff_link(base_path, result, &self.inputs, self.mode))
    }

    pub fn handle(&mut self, event: Event) -> Result<Step, DisclosureError> {
        let event_name = event.name();
        let effects = match (self.phase, event) {
            (Phase::Collecting, Event::EditInput { field, value }) => {
                if !self.mode.is_active(field) {
                    return Err(InputError::InactiveField {
                        field,
                        mode: self.mode,
                    }
                    .into());
                }
                self.inputs.set(field, value)?;
                self.result = compute_scoped(&self.inputs, self.mode);
                Vec::new()
            }
            (Phase::Collecting, Event::RequestCalculation) => {
                self.enter(Phase::Gating);
                vec![track(
                    EVENT_GATE_VIEWED,
                    json!({ "mode": self.mode, "total_gap": self.result.total.monthly }),
                )]
            }
            (Phase::Gating, Event::UpdateContact(contact)) => {
                self.contact = contact;
                Vec::new()
            }
            (Phase::Gating, Event::SubmitContact) => self.submit_contact(),
            (Phase::Revealed, Event::ClickCta(cta)) => vec![track(
                cta.event_name(),
                json!({
                    "total_gap": self.result.total.monthly,
                    "destination": cta.destination(),
                }),
            )],
            (phase, _) => {
                return Err(DisclosureError::NotAllowed {
                    phase,
                    event: event_name,
                });
            }
        };

        Ok(Step {
            phase: self.phase,
            effects,
        })
    }

    pub fn drive(
        &mut self,
        event: Event,
        analytics: &dyn AnalyticsSink,
        contacts: &dyn ContactSink,
    ) -> Result<Phase, DisclosureError> {
        let step = self.handle(event)?;
        dispatch(&step.effects, analytics, contacts);
        Ok(step.phase)
    }

    fn submit_contact(&mut self) -> Vec<Effect> {
        let validation = validate(&self.contact);
        if !validation.accepted() {
            debug!(
                email_valid = validation.email_valid,
                phone_valid = validation.phone_valid,
                "contact gate rejected submission"
            );
            self.gate_feedback = Some(validation);
            return Vec::new();
        }

        self.gate_feedback = Some(validation);
        let contact = std::mem::take(&mut self.contact);
        self.enter(Phase::Revealed);

        let leak_count = leaks(&self.result).len();
        vec![
            Effect::CaptureContact(contact),
            track(EVENT_CONTACT_CAPTURED, json!({ "mode": self.mode })),
            track(
                EVENT_LEAKS_TEASED,
                json!({
                    "leak_count": leak_count,
                    "remaining": TOTAL_LEAK_CATEGORIES.saturating_sub(leak_count),
                    "total_gap": self.result.total.monthly,
                }),
            ),
        ]
    }

    fn enter(&mut self, next: Phase) {
        info!(from = %self.phase, to = %next, mode = %self.mode, "disclosure phase changed");
        self.phase = next;
    }
}

fn track(name: &'static str, properties: Value) -> Effect {
    Effect::Track(AnalyticsEvent { name, properties })
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("analytics delivery failed: {0}")]
    Analytics(String),
    #[error("contact capture failed: {0}")]
    ContactCapture(String),
}

pub trait AnalyticsSink {
    fn track(&self, event: &AnalyticsEvent) -> Result<(), CollaboratorError>;
}

pub trait ContactSink {
    fn capture(&self, contact: &Contact) -> Result<(), CollaboratorError>;
}

/// Writes analytics events to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAnalytics;

impl AnalyticsSink for LogAnalytics {
    fn track(&self, event: &AnalyticsEvent) -> Result<(), CollaboratorError> {
        info!(event = event.name, properties = %event.properties, "analytics event");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardContacts;

impl ContactSink for DiscardContacts {
    fn capture(&self, _contact: &Contact) -> Result<(), CollaboratorError> {
        debug!("contact captured and discarded");
        Ok(())
    }
}

/// Fire-and-forget delivery of effects. Never fails.
pub fn dispatch(effects: &[Effect], analytics: &dyn AnalyticsSink, contacts: &dyn ContactSink) {
    for effect in effects {
        let outcome = match effect {
            Effect::Track(event) => analytics.track(event),
            Effect::CaptureContact(contact) => contacts.capture(contact),
        };
        if let Err(err) = outcome {
            warn!(error = %err, "collaborator failed; continuing");
        }
    }
}
