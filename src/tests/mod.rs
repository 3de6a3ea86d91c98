mod test_multispeed_heat_pump;
mod test_run_project;
