mod test_room_session;
