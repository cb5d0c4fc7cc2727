mod trace;

pub use trace::TraceService;
