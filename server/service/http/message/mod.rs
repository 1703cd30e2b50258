/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub(crate) mod body;
pub(crate) mod document;
pub(crate) mod error;
pub(crate) mod path;
pub(crate) mod session;
