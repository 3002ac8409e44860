mod pet_flow_test;
