mod disclosure;
mod engine;
mod format;
mod gate;
mod handoff;
mod presenter;
mod types;

pub use disclosure::{
    AnalyticsEvent, AnalyticsSink, CollaboratorError, ContactSink, Cta, DiscardContacts,
    DisclosureError, Effect, Event, LogAnalytics, Phase, Session, Step, dispatch,
};
pub use engine::{TOTAL_LEAK_CATEGORIES, compute, compute_scoped, leaks};
pub use format::{dollars, thousands};
pub use gate::{Contact, ContactField, FieldError, GateValidation, validate};
pub use handoff::{
    Feature, FeatureCard, HandoffContext, Personalization, decode, encode, handoff_link,
};
pub use presenter::{
    DEFAULT_DURATION, DEFAULT_STEPS, Presentation, Scheduler, TimerId, TokioScheduler,
    ValuePresenter, VirtualClock, animate,
};
pub use types::{
    CalculatorResult, FieldSpec, GarbageBreakdown, InputError, InputField, Inputs, Leak, LeakKind,
    MissedBreakdown, Mode, TotalGap,
};
