mod test_presence_expiry;
