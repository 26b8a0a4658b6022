use axum::{
    Router,
    extract::{Json, Query, RawQuery},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::core::{
    AnalyticsSink, CalculatorResult, Contact, ContactSink, DEFAULT_DURATION, DEFAULT_STEPS,
    DiscardContacts, Event, FieldSpec, GateValidation, HandoffContext, InputError, InputField,
    Inputs, Leak, LogAnalytics, Mode, Personalization, Phase, Session, animate, decode, dollars,
    leaks,
};

pub const EXPERIENCE_PATH: &str = "/experience";

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliMode {
    Combined,
    Garbage,
    Missed,
}

impl From<CliMode> for Mode {
    fn from(value: CliMode) -> Self {
        match value {
            CliMode::Combined => Mode::Combined,
            CliMode::Garbage => Mode::Garbage,
            CliMode::Missed => Mode::Missed,
        }
    }
}

impl From<Mode> for CliMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Combined => CliMode::Combined,
            Mode::Garbage => CliMode::Garbage,
            Mode::Missed => CliMode::Missed,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "revenue-gap",
    about = "Revenue gap calculator (garbage leads + missed calls) with contact gate and handoff link"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the calculator API over HTTP.
    Serve {
        #[arg(long, env = "PORT", default_value_t = 8080)]
        port: u16,
    },
    /// Run one calculator session and print the revealed result as JSON.
    Estimate(EstimateArgs),
    /// Decode a handoff query string into experience-page personalization.
    Decode { query: String },
}

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    #[arg(long, value_enum, default_value_t = CliMode::Combined)]
    mode: CliMode,
    #[arg(long, default_value_t = 40, help = "Total leads per month across channels")]
    monthly_leads: u32,
    #[arg(long, default_value_t = 10_000, help = "Typical revenue of a completed job")]
    avg_job_value: u32,
    #[arg(long, default_value_t = 20, help = "Lead to customer conversion in percent")]
    close_rate: u32,
    #[arg(
        long,
        default_value_t = 40,
        help = "Share of leads that never convert, in percent"
    )]
    tire_kicker_percent: u32,
    #[arg(long, default_value_t = 20, help = "Unanswered calls per month")]
    missed_calls: u32,
    #[arg(long, default_value_t = 250, help = "Owner's hourly value")]
    hourly_value: u32,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, help = "Count the monthly gap up on stderr before printing")]
    animate: bool,
}

impl EstimateArgs {
    fn value(&self, field: InputField) -> u32 {
        match field {
            InputField::MonthlyLeads => self.monthly_leads,
            InputField::AvgJobValue => self.avg_job_value,
            InputField::CloseRate => self.close_rate,
            InputField::TireKickerPercent => self.tire_kicker_percent,
            InputField::MissedCalls => self.missed_calls,
            InputField::HourlyValue => self.hourly_value,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Invalid(String),
    #[error("contact gate rejected: {0}")]
    GateRejected(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SessionPayload {
    mode: Option<Mode>,
    monthly_leads: Option<u32>,
    avg_job_value: Option<u32>,
    close_rate: Option<u32>,
    tire_kicker_percent: Option<u32>,
    missed_calls: Option<u32>,
    hourly_value: Option<u32>,
    email: Option<String>,
    phone: Option<String>,
}

impl SessionPayload {
    fn supplied_fields(&self) -> Vec<InputField> {
        [
            (InputField::MonthlyLeads, self.monthly_leads),
            (InputField::AvgJobValue, self.avg_job_value),
            (InputField::CloseRate, self.close_rate),
            (InputField::TireKickerPercent, self.tire_kicker_percent),
            (InputField::MissedCalls, self.missed_calls),
            (InputField::HourlyValue, self.hourly_value),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.map(|_| field))
        .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FieldsQuery {
    mode: Option<Mode>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RevealResponse {
    mode: Mode,
    phase: Phase,
    inputs: Inputs,
    result: CalculatorResult,
    leaks: Vec<Leak>,
    monthly_gap_display: String,
    annual_gap_display: String,
    handoff_link: String,
}

#[derive(Debug, Serialize)]
struct GateRejectedResponse {
    error: String,
    validation: GateValidation,
}

#[derive(Debug, Serialize)]
struct FieldsResponse {
    mode: Mode,
    fields: Vec<FieldSpec>,
}

#[derive(Debug, Serialize)]
struct ExperienceResponse {
    context: HandoffContext,
    personalization: Personalization,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
enum SessionOutcome {
    Revealed(RevealResponse),
    Rejected(GateValidation),
}

pub async fn run(cli: Cli) -> Result<(), ApiError> {
    match cli.command {
        Command::Serve { port } => run_http_server(port).await?,
        Command::Estimate(args) => run_estimate(args).await?,
        Command::Decode { query } => {
            let response = experience_response(&query);
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }
    Ok(())
}

async fn run_estimate(args: EstimateArgs) -> Result<(), ApiError> {
    let animate_gap = args.animate;
    let response = match run_session(&args, &LogAnalytics, &DiscardContacts)? {
        SessionOutcome::Revealed(response) => response,
        SessionOutcome::Rejected(validation) => {
            return Err(ApiError::GateRejected(join_gate_errors(&validation)));
        }
    };

    if animate_gap {
        animate(
            response.result.total.monthly,
            DEFAULT_DURATION,
            DEFAULT_STEPS,
            |value| eprint!("\r{}/mo", dollars(value)),
        )
        .await;
        eprintln!();
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/api/fields", get(fields_handler))
        .route("/api/session", post(session_handler))
        .route("/api/experience", get(experience_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "revenue gap API listening");
    info!("local access: http://127.0.0.1:{port}/api/fields");

    axum::serve(listener, app).await
}

async fn fields_handler(Query(query): Query<FieldsQuery>) -> Response {
    json_response(StatusCode::OK, fields_response(query.mode.unwrap_or(Mode::Combined)))
}

async fn session_handler(Json(payload): Json<SessionPayload>) -> Response {
    let args = match estimate_args_from_payload(payload) {
        Ok(args) => args,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match run_session(&args, &LogAnalytics, &DiscardContacts) {
        Ok(SessionOutcome::Revealed(response)) => json_response(StatusCode::OK, response),
        Ok(SessionOutcome::Rejected(validation)) => json_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            GateRejectedResponse {
                error: join_gate_errors(&validation),
                validation,
            },
        ),
        Err(err) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    }
}

async fn experience_handler(RawQuery(query): RawQuery) -> Response {
    json_response(
        StatusCode::OK,
        experience_response(query.as_deref().unwrap_or_default()),
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn fields_response(mode: Mode) -> FieldsResponse {
    FieldsResponse {
        mode,
        fields: mode.active_fields().iter().map(|f| f.spec()).collect(),
    }
}

fn experience_response(query: &str) -> ExperienceResponse {
    let context = decode(query);
    let personalization = Personalization::from_context(&context);
    ExperienceResponse {
        context,
        personalization,
    }
}

fn join_gate_errors(validation: &GateValidation) -> String {
    validation
        .errors
        .iter()
        .map(|e| e.message)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
fn estimate_args_from_json(json: &str) -> Result<EstimateArgs, String> {
    let payload = serde_json::from_str::<SessionPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    estimate_args_from_payload(payload)
}

fn estimate_args_from_payload(payload: SessionPayload) -> Result<EstimateArgs, String> {
    let mut args = default_estimate_args();

    if let Some(v) = payload.mode {
        args.mode = v.into();
    }
    let mode = Mode::from(args.mode);
    for field in payload.supplied_fields() {
        if !mode.is_active(field) {
            let err = InputError::InactiveField { field, mode };
            return Err(format!("--{}: {err}", cli_flag(field)));
        }
    }
    if let Some(v) = payload.monthly_leads {
        args.monthly_leads = v;
    }
    if let Some(v) = payload.avg_job_value {
        args.avg_job_value = v;
    }
    if let Some(v) = payload.close_rate {
        args.close_rate = v;
    }
    if let Some(v) = payload.tire_kicker_percent {
        args.tire_kicker_percent = v;
    }
    if let Some(v) = payload.missed_calls {
        args.missed_calls = v;
    }
    if let Some(v) = payload.hourly_value {
        args.hourly_value = v;
    }
    if let Some(v) = payload.email {
        args.email = v;
    }
    if let Some(v) = payload.phone {
        args.phone = v;
    }

    build_inputs(&args)?;
    Ok(args)
}

fn default_estimate_args() -> EstimateArgs {
    let defaults = Inputs::default();
    EstimateArgs {
        mode: CliMode::Combined,
        monthly_leads: defaults.monthly_leads(),
        avg_job_value: defaults.avg_job_value(),
        close_rate: defaults.close_rate(),
        tire_kicker_percent: defaults.tire_kicker_percent(),
        missed_calls: defaults.missed_calls(),
        hourly_value: defaults.hourly_value(),
        email: String::new(),
        phone: String::new(),
        animate: false,
    }
}

/// Range-checks the fields the chosen mode uses; the rest keep their defaults.
fn build_inputs(args: &EstimateArgs) -> Result<Inputs, String> {
    let mode = Mode::from(args.mode);
    let mut inputs = Inputs::default();
    for field in mode.active_fields() {
        inputs
            .set(*field, args.value(*field))
            .map_err(|e| format!("--{}: {e}", cli_flag(*field)))?;
    }
    Ok(inputs)
}

fn cli_flag(field: InputField) -> &'static str {
    match field {
        InputField::MonthlyLeads => "monthly-leads",
        InputField::AvgJobValue => "avg-job-value",
        InputField::CloseRate => "close-rate",
        InputField::TireKickerPercent => "tire-kicker-percent",
        InputField::MissedCalls => "missed-calls",
        InputField::HourlyValue => "hourly-value",
    }
}

fn run_session(
    args: &EstimateArgs,
    analytics: &dyn AnalyticsSink,
    contacts: &dyn ContactSink,
) -> Result<SessionOutcome, ApiError> {
    let mode = Mode::from(args.mode);
    let inputs = build_inputs(args).map_err(ApiError::Invalid)?;
    let mut session = Session::new(mode);

    let mut events = mode
        .active_fields()
        .iter()
        .map(|field| Event::EditInput {
            field: *field,
            value: inputs.get(*field),
        })
        .collect::<Vec<_>>();
    events.push(Event::RequestCalculation);
    events.push(Event::UpdateContact(Contact::new(
        args.email.clone(),
        args.phone.clone(),
    )));
    events.push(Event::SubmitContact);

    for event in events {
        session
            .drive(event, analytics, contacts)
            .map_err(|e| ApiError::Invalid(e.to_string()))?;
    }

    if session.phase() != Phase::Revealed {
        let validation = session.gate_feedback().cloned().unwrap_or_default();
        warn!(errors = validation.errors.len(), "session stopped at contact gate");
        return Ok(SessionOutcome::Rejected(validation));
    }

    let Some(result) = session.visible_result().copied() else {
        return Err(ApiError::Invalid("result not revealed".to_string()));
    };
    let handoff_link = session
        .handoff_link(EXPERIENCE_PATH)
        .unwrap_or_else(|| EXPERIENCE_PATH.to_string());

    Ok(SessionOutcome::Revealed(RevealResponse {
        mode,
        phase: session.phase(),
        inputs: *session.inputs(),
        result,
        leaks: leaks(&result),
        monthly_gap_display: dollars(result.total.monthly),
        annual_gap_display: dollars(result.total.annual),
        handoff_link,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ContactField;
    use std::fs;
    use std::path::Path;

    fn sample_args() -> EstimateArgs {
        let mut args = default_estimate_args();
        args.email = "owner@roofing.example".to_string();
        args.phone = "5551234567".to_string();
        args
    }

    fn reveal(args: &EstimateArgs) -> RevealResponse {
        match run_session(args, &LogAnalytics, &DiscardContacts).expect("session runs") {
            SessionOutcome::Revealed(response) => response,
            SessionOutcome::Rejected(validation) => {
                panic!("gate unexpectedly rejected: {validation:?}")
            }
        }
    }

    fn assert_golden_snapshot(path: &str, actual: &str) {
        let update = matches!(
            std::env::var("UPDATE_GOLDEN").as_deref(),
            Ok("1") | Ok("true") | Ok("TRUE")
        );
        let snapshot_path = Path::new(path);

        if update {
            if let Some(parent) = snapshot_path.parent() {
                fs::create_dir_all(parent).expect("failed to create snapshot directory");
            }
            fs::write(snapshot_path, actual).expect("failed to write golden snapshot");
            return;
        }

        let expected = fs::read_to_string(snapshot_path).unwrap_or_else(|_| {
            panic!("missing golden snapshot at {path}; run with UPDATE_GOLDEN=1 to generate")
        });
        assert_eq!(
            actual, expected,
            "snapshot mismatch for {path}; run with UPDATE_GOLDEN=1 to refresh if expected"
        );
    }

    #[test]
    fn estimate_args_from_json_parses_web_keys() {
        let json = r#"{
          "mode": "garbage",
          "monthlyLeads": 120,
          "avgJobValue": 15000,
          "closeRate": 25,
          "tireKickerPercent": 30,
          "hourlyValue": 400,
          "email": "a@b.com",
          "phone": "5551234567"
        }"#;
        let args = estimate_args_from_json(json).expect("json should parse");

        assert_eq!(args.mode, CliMode::Garbage);
        assert_eq!(args.monthly_leads, 120);
        assert_eq!(args.avg_job_value, 15_000);
        assert_eq!(args.close_rate, 25);
        assert_eq!(args.tire_kicker_percent, 30);
        assert_eq!(args.missed_calls, 20);
        assert_eq!(args.hourly_value, 400);
        assert_eq!(args.email, "a@b.com");
    }

    #[test]
    fn estimate_args_rejects_out_of_range_active_field() {
        let err = estimate_args_from_json(r#"{ "closeRate": 80 }"#)
            .expect_err("close rate above range must be rejected");
        assert!(err.contains("--close-rate"));
    }

    #[test]
    fn estimate_args_rejects_field_inactive_in_mode() {
        let err = estimate_args_from_json(r#"{ "mode": "garbage", "missedCalls": 9999 }"#)
            .expect_err("missed calls is not editable in garbage mode");
        assert!(err.contains("--missed-calls"));
        assert!(err.contains("not editable in garbage mode"));

        let err = estimate_args_from_json(r#"{ "mode": "missed", "hourlyValue": 250 }"#)
            .expect_err("even an in-range value is rejected when inactive");
        assert!(err.contains("--hourly-value"));
    }

    #[test]
    fn omitted_inactive_fields_keep_defaults() {
        let args = estimate_args_from_json(r#"{ "mode": "missed", "missedCalls": 12 }"#)
            .expect("only active fields supplied");
        assert_eq!(args.mode, CliMode::Missed);
        assert_eq!(args.missed_calls, 12);
        assert_eq!(args.hourly_value, Inputs::default().hourly_value());
    }

    #[test]
    fn estimate_args_rejects_unknown_mode() {
        let err = estimate_args_from_json(r#"{ "mode": "everything" }"#)
            .expect_err("unknown mode must fail to parse");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn cli_parses_estimate_flags() {
        let cli = Cli::try_parse_from([
            "revenue-gap",
            "estimate",
            "--mode",
            "missed",
            "--missed-calls",
            "12",
            "--email",
            "a@b.com",
            "--phone",
            "5551234567",
        ])
        .expect("flags parse");
        let Command::Estimate(args) = cli.command else {
            panic!("expected estimate command");
        };
        assert_eq!(args.mode, CliMode::Missed);
        assert_eq!(args.missed_calls, 12);
        assert_eq!(args.monthly_leads, 40);
        assert!(!args.animate);
    }

    #[test]
    fn cli_serve_defaults_port() {
        let cli = Cli::try_parse_from(["revenue-gap", "serve"]).expect("serve parses");
        assert!(matches!(cli.command, Command::Serve { .. }));
    }

    #[test]
    fn session_without_contact_is_rejected_at_gate() {
        let args = default_estimate_args();
        let outcome = run_session(&args, &LogAnalytics, &DiscardContacts).expect("session runs");
        let SessionOutcome::Rejected(validation) = outcome else {
            panic!("gate must reject empty contact");
        };
        assert_eq!(validation.errors.len(), 2);
        assert!(validation.error_for(ContactField::Email).is_some());
        assert!(join_gate_errors(&validation).contains("; "));
    }

    #[test]
    fn revealed_session_reports_reference_totals() {
        let response = reveal(&sample_args());
        assert_eq!(response.result.total.monthly, 52_400);
        assert_eq!(response.result.total.annual, 628_800);
        assert_eq!(response.monthly_gap_display, "$52,400");
        assert_eq!(response.leaks.len(), 2);
        assert!(response.handoff_link.starts_with("/experience?from=calculator"));
    }

    #[test]
    fn garbage_mode_session_surfaces_one_leak() {
        let mut args = sample_args();
        args.mode = CliMode::Garbage;
        let response = reveal(&args);
        assert_eq!(response.result.total.monthly, 32_400);
        assert_eq!(response.leaks.len(), 1);
        assert!(response.handoff_link.contains("missed_cost=0"));
        assert!(response.handoff_link.contains("mode=garbage"));
    }

    #[test]
    fn fields_response_follows_capability_table() {
        let fields = fields_response(Mode::Missed);
        let names = fields.fields.iter().map(|f| f.field).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                InputField::AvgJobValue,
                InputField::CloseRate,
                InputField::MissedCalls
            ]
        );
        assert_eq!(fields_response(Mode::Combined).fields.len(), 6);
    }

    #[test]
    fn experience_response_round_trips_reveal_link() {
        let response = reveal(&sample_args());
        let experience = experience_response(&response.handoff_link);
        assert!(experience.context.from_calculator);
        assert_eq!(experience.context.total_gap, Some(52_400));
        assert!(experience.personalization.highlight_garbage);
        assert_eq!(
            experience.personalization.final_cta_headline,
            "Stop losing $52,400/month"
        );
    }

    #[test]
    fn experience_response_tolerates_garbage_query() {
        let experience = experience_response("from=&total_gap=NaN&&&mode=");
        assert!(!experience.context.from_calculator);
        assert!(experience.personalization.show_calculator_banner);
    }

    #[test]
    fn reveal_response_serialization_contains_expected_fields() {
        let json = serde_json::to_string(&reveal(&sample_args())).expect("response should serialize");
        assert!(json.contains("\"result\""));
        assert!(json.contains("\"leaks\""));
        assert!(json.contains("\"handoffLink\""));
        assert!(json.contains("\"opportunityCost\""));
        assert!(json.contains("\"phase\":\"revealed\""));
    }

    #[test]
    fn golden_snapshot_reveal_combined_json() {
        let json = format!(
            "{}\n",
            serde_json::to_string(&reveal(&sample_args())).expect("response should serialize")
        );

        assert_golden_snapshot("tests/golden/reveal_combined_reference.json", &json);
    }
}
