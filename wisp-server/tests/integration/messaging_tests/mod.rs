mod test_directed_signal_routing;
