mod test_peer_leaves_others_stay;
mod test_rooms_are_isolated;
