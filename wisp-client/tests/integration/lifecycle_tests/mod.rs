mod test_grace_period;
mod test_link_failure_is_isolated;
