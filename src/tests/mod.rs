//! Scenario tests that run the energy and tide pipelines end to end.
