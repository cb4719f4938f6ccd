// Copyright 2021-2025 Sebastian Ramacher
// SPDX-License-Identifier: LGPL-3.0-or-later

//! # Utils used by other modules.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::de;

#[derive(Debug)]
pub(crate) struct DateTimeVisitor<'a>(pub &'a str);

impl de::Visitor<'_> for DateTimeVisitor<'_> {
    type Value = DateTime<Utc>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a date and time formatted as {}", self.0)
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        match Utc.datetime_from_str(s, self.0) {
            Ok(dt) => Ok(dt),
            Err(_) => Err(de::Error::invalid_value(de::Unexpected::Str(s), &self)),
        }
    }
}

/// Deserialize a whitespace-separated list of `T: FromStr` values.
#[derive(Debug)]
pub(crate) struct WhitespaceListVisitor<T>(PhantomData<T>);

impl<T> WhitespaceListVisitor<T> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> de::Visitor<'_> for WhitespaceListVisitor<T>
where
    T: FromStr,
{
    type Value = Vec<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "a whitespace-separated list")
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        s.split_whitespace()
            .map(|item| T::from_str(item).map_err(|_| de::Error::invalid_value(de::Unexpected::Str(item), &self)))
            .collect()
    }
}

/// Deserialize a string into `T` via `TryFrom<&str>`.
#[derive(Debug)]
pub(crate) struct TryFromStrVisitor<T> {
    expecting: &'static str,
    _marker: PhantomData<T>,
}

impl<T> TryFromStrVisitor<T> {
    pub(crate) fn new(expecting: &'static str) -> Self {
        Self {
            expecting,
            _marker: PhantomData,
        }
    }
}

impl<T> de::Visitor<'_> for TryFromStrVisitor<T>
where
    T: for<'a> TryFrom<&'a str>,
{
    type Value = T;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        write!(formatter, "{}", self.expecting)
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        T::try_from(s).map_err(|_| de::Error::invalid_value(de::Unexpected::Str(s), &self))
    }
}
