// End-to-end tests for the batch engine.
//
// Scheduler tests drive an in-process mock provider through the worker pool.
// Provider tests stand up local axum servers that mimic each vendor's REST API,
// so adapters are exercised over real HTTP without network access.

mod helpers;
mod test_providers;
mod test_scheduler;
