mod test_engine_start_failure_is_fatal;
mod test_two_peers_establish;
mod test_unreachable_peer_is_dropped;
