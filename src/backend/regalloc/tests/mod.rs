mod test_pbqp;
