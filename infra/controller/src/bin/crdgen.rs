//! SPDX-FileCopyrightText: © 2025 Cory Parent <goedelsoup+orasi@goedelsoup.io>
//! SPDX-License-Identifier: Apache-2.0

//! Prints the KafkaSchema CustomResourceDefinition

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", kafka_schema_controller::crd::generate_crd()?);
    Ok(())
}
