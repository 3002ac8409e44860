mod client_test;
mod mock;
mod reconciler_test;
