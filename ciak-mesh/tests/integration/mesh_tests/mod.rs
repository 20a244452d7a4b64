mod test_add_user_is_idempotent;
mod test_duplicate_add_user_over_wire;
mod test_three_devices_form_mesh;
