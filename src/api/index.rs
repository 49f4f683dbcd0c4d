use axum::Json;
use serde_json::{json, Value};
use std::sync::OnceLock;

/// Static JSON response for the index endpoint
static INDEX_JSON: OnceLock<Value> = OnceLock::new();

/// Handler for the index endpoint that provides API documentation
///
/// # Endpoint: GET /
///
/// # Returns
/// * `Json<Value>` - JSON response containing API endpoint documentation
pub fn index() -> Json<Value> {
    let value = INDEX_JSON.get_or_init(|| {
        json!({
            "endpoints": [
                {
                    "path": "/",
                    "method": "GET",
                    "description": "API endpoint documentation",
                    "access": "public",
                    "params": {}
                },
                {
                    "path": "/health",
                    "method": "GET",
                    "description": "Service, database, Redis and housekeeping status",
                    "access": "public",
                    "params": {}
                },
                {
                    "path": "/api/auth/register",
                    "method": "POST",
                    "description": "Create a student account",
                    "access": "public",
                    "params": {
                        "email": {
                            "type": "string",
                            "required": true,
                            "description": "Email address, unique"
                        },
                        "password": {
                            "type": "string",
                            "required": true,
                            "description": "8 to 128 characters with at least one letter and one digit"
                        },
                        "full_name": {
                            "type": "string",
                            "required": true,
                            "description": "Display name"
                        },
                        "phone": {
                            "type": "string",
                            "required": false,
                            "description": "7 to 20 digits with an optional leading +"
                        }
                    }
                },
                {
                    "path": "/api/auth/login",
                    "method": "POST",
                    "description": "Exchange credentials for a bearer token",
                    "access": "public",
                    "params": {
                        "email": {
                            "type": "string",
                            "required": true,
                            "description": "Account email"
                        },
                        "password": {
                            "type": "string",
                            "required": true,
                            "description": "Account password"
                        }
                    }
                },
                {
                    "path": "/api/auth/logout",
                    "method": "POST",
                    "description": "Revoke the current session",
                    "access": "user",
                    "params": {}
                },
                {
                    "path": "/api/auth/me",
                    "method": "GET",
                    "description": "Current user profile",
                    "access": "user",
                    "params": {}
                },
                {
                    "path": "/api/auth/me",
                    "method": "PUT",
                    "description": "Update full_name and phone",
                    "access": "user",
                    "params": {
                        "full_name": {
                            "type": "string",
                            "required": false,
                            "description": "Display name"
                        },
                        "phone": {
                            "type": "string",
                            "required": false,
                            "description": "Phone number"
                        }
                    }
                },
                {
                    "path": "/api/auth/password",
                    "method": "PUT",
                    "description": "Change password and revoke other sessions",
                    "access": "user",
                    "params": {
                        "current_password": {
                            "type": "string",
                            "required": true,
                            "description": "Current password"
                        },
                        "new_password": {
                            "type": "string",
                            "required": true,
                            "description": "New password"
                        }
                    }
                },
                {
                    "path": "/api/admin/users",
                    "method": "GET",
                    "description": "List users",
                    "access": "admin",
                    "params": {
                        "role": {
                            "type": "string",
                            "required": false,
                            "description": "student, instructor or admin"
                        },
                        "search": {
                            "type": "string",
                            "required": false,
                            "description": "Matches email or name"
                        },
                        "page": {
                            "type": "integer",
                            "required": false,
                            "description": "Page number (starting from 1)"
                        },
                        "per_page": {
                            "type": "integer",
                            "required": false,
                            "description": "Items per page, at most 100"
                        }
                    }
                },
                {
                    "path": "/api/admin/users/:id",
                    "method": "GET",
                    "description": "Get a user",
                    "access": "admin",
                    "params": {}
                },
                {
                    "path": "/api/admin/users/:id",
                    "method": "DELETE",
                    "description": "Delete a user without payments or attempts",
                    "access": "admin",
                    "params": {}
                },
                {
                    "path": "/api/admin/users/:id/role",
                    "method": "PUT",
                    "description": "Change a user's role",
                    "access": "admin",
                    "params": {
                        "role": {
                            "type": "string",
                            "required": true,
                            "description": "student, instructor or admin"
                        }
                    }
                },
                {
                    "path": "/api/admin/users/:id/status",
                    "method": "PUT",
                    "description": "Activate or deactivate a user",
                    "access": "admin",
                    "params": {
                        "is_active": {
                            "type": "boolean",
                            "required": true,
                            "description": "New account state"
                        }
                    }
                },
                {
                    "path": "/api/admin/audit-logs",
                    "method": "GET",
                    "description": "List audit entries",
                    "access": "admin",
                    "params": {
                        "entity_type": {
                            "type": "string",
                            "required": false,
                            "description": "Only entries for this entity type"
                        }
                    }
                },
                {
                    "path": "/api/categories",
                    "method": "GET",
                    "description": "List exam categories",
                    "access": "public",
                    "params": {
                        "include_inactive": {
                            "type": "boolean",
                            "required": false,
                            "description": "Admins only: include inactive categories"
                        }
                    }
                },
                {
                    "path": "/api/categories",
                    "method": "POST",
                    "description": "Create a category",
                    "access": "admin",
                    "params": {
                        "name": {
                            "type": "string",
                            "required": true,
                            "description": "Unique name"
                        },
                        "description": {
                            "type": "string",
                            "required": false,
                            "description": "Description"
                        },
                        "is_active": {
                            "type": "boolean",
                            "required": false,
                            "description": "Defaults to true"
                        }
                    }
                },
                {
                    "path": "/api/categories/:id",
                    "method": "PUT",
                    "description": "Update a category",
                    "access": "admin",
                    "params": {}
                },
                {
                    "path": "/api/categories/:id",
                    "method": "DELETE",
                    "description": "Delete a category without exams",
                    "access": "admin",
                    "params": {}
                },
                {
                    "path": "/api/exams",
                    "method": "GET",
                    "description": "List exams; staff also see drafts",
                    "access": "user",
                    "params": {
                        "category_id": {
                            "type": "string",
                            "required": false,
                            "description": "Filter by category"
                        },
                        "search": {
                            "type": "string",
                            "required": false,
                            "description": "Matches the title"
                        }
                    }
                },
                {
                    "path": "/api/exams",
                    "method": "POST",
                    "description": "Create an exam",
                    "access": "staff",
                    "params": {
                        "category_id": {
                            "type": "string",
                            "required": true,
                            "description": "Active category"
                        },
                        "title": {
                            "type": "string",
                            "required": true,
                            "description": "3 to 200 characters"
                        },
                        "duration_minutes": {
                            "type": "integer",
                            "required": true,
                            "description": "1 to 600"
                        },
                        "total_marks": {
                            "type": "integer",
                            "required": true,
                            "description": "At least 1"
                        },
                        "passing_marks": {
                            "type": "integer",
                            "required": true,
                            "description": "At most total_marks"
                        },
                        "price_cents": {
                            "type": "integer",
                            "required": false,
                            "description": "Price in minor units, 0 for free exams"
                        },
                        "currency": {
                            "type": "string",
                            "required": false,
                            "description": "3-letter code, defaults to USD"
                        },
                        "max_attempts": {
                            "type": "integer",
                            "required": false,
                            "description": "1 to 10, defaults to 1"
                        }
                    }
                },
                {
                    "path": "/api/exams/:id",
                    "method": "GET",
                    "description": "Get an exam",
                    "access": "user",
                    "params": {}
                },
                {
                    "path": "/api/exams/:id",
                    "method": "PUT",
                    "description": "Update an exam",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/exams/:id",
                    "method": "DELETE",
                    "description": "Delete an exam without bookings",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/exams/:id/publish",
                    "method": "POST",
                    "description": "Publish an exam whose question marks add up to total_marks",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/exams/:id/unpublish",
                    "method": "POST",
                    "description": "Withdraw an exam from the catalogue",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/exams/:id/questions",
                    "method": "GET",
                    "description": "Questions with answer keys",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/exams/:id/questions",
                    "method": "POST",
                    "description": "Add a question to a draft exam",
                    "access": "staff",
                    "params": {
                        "question_type": {
                            "type": "string",
                            "required": true,
                            "description": "single_choice, multiple_choice, true_false, short_answer or essay"
                        },
                        "text": {
                            "type": "string",
                            "required": true,
                            "description": "Question text"
                        },
                        "marks": {
                            "type": "integer",
                            "required": true,
                            "description": "1 to 100"
                        },
                        "difficulty": {
                            "type": "string",
                            "required": false,
                            "description": "easy, medium or hard"
                        },
                        "model_answer": {
                            "type": "string",
                            "required": false,
                            "description": "Required for short_answer"
                        },
                        "keywords": {
                            "type": "array",
                            "required": false,
                            "description": "Essay keywords"
                        },
                        "min_words": {
                            "type": "integer",
                            "required": false,
                            "description": "Essay length target"
                        },
                        "options": {
                            "type": "array",
                            "required": false,
                            "description": "Choice options with text and is_correct"
                        }
                    }
                },
                {
                    "path": "/api/questions/:id",
                    "method": "PUT",
                    "description": "Replace a question of a draft exam",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/questions/:id",
                    "method": "DELETE",
                    "description": "Delete a question of a draft exam",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/bookings",
                    "method": "GET",
                    "description": "List own bookings; admins see all",
                    "access": "user",
                    "params": {
                        "status": {
                            "type": "string",
                            "required": false,
                            "description": "Filter by booking status"
                        }
                    }
                },
                {
                    "path": "/api/bookings",
                    "method": "POST",
                    "description": "Book a published exam",
                    "access": "user",
                    "params": {
                        "exam_id": {
                            "type": "string",
                            "required": true,
                            "description": "Exam to book"
                        },
                        "scheduled_at": {
                            "type": "string",
                            "required": true,
                            "description": "UTC timestamp, 1 minute to 365 days ahead"
                        }
                    }
                },
                {
                    "path": "/api/bookings/:id",
                    "method": "GET",
                    "description": "Get a booking",
                    "access": "owner or admin",
                    "params": {}
                },
                {
                    "path": "/api/bookings/:id/cancel",
                    "method": "POST",
                    "description": "Cancel a booking, refunding a completed payment",
                    "access": "owner or admin",
                    "params": {}
                },
                {
                    "path": "/api/payments",
                    "method": "GET",
                    "description": "List own payments; admins see all",
                    "access": "user",
                    "params": {}
                },
                {
                    "path": "/api/payments",
                    "method": "POST",
                    "description": "Start paying for a pending booking",
                    "access": "user",
                    "params": {
                        "booking_id": {
                            "type": "string",
                            "required": true,
                            "description": "Pending booking"
                        },
                        "method": {
                            "type": "string",
                            "required": true,
                            "description": "card, bank_transfer or wallet"
                        }
                    }
                },
                {
                    "path": "/api/payments/:id/confirm",
                    "method": "POST",
                    "description": "Report the gateway outcome",
                    "access": "owner",
                    "params": {
                        "success": {
                            "type": "boolean",
                            "required": true,
                            "description": "Whether the charge went through"
                        },
                        "transaction_ref": {
                            "type": "string",
                            "required": false,
                            "description": "Required when success is true"
                        }
                    }
                },
                {
                    "path": "/api/payments/:id/refund",
                    "method": "POST",
                    "description": "Refund a completed payment",
                    "access": "admin",
                    "params": {}
                },
                {
                    "path": "/api/billing/:payment_id/invoice",
                    "method": "GET",
                    "description": "Invoice PDF of a settled payment",
                    "access": "owner or admin",
                    "params": {}
                },
                {
                    "path": "/api/attempts",
                    "method": "GET",
                    "description": "List own attempts",
                    "access": "user",
                    "params": {}
                },
                {
                    "path": "/api/attempts",
                    "method": "POST",
                    "description": "Start or resume an attempt",
                    "access": "user",
                    "params": {
                        "booking_id": {
                            "type": "string",
                            "required": true,
                            "description": "Confirmed booking"
                        }
                    }
                },
                {
                    "path": "/api/attempts/:id",
                    "method": "GET",
                    "description": "Attempt result with graded responses",
                    "access": "owner or staff",
                    "params": {}
                },
                {
                    "path": "/api/attempts/:id/submit",
                    "method": "POST",
                    "description": "Submit answers for grading",
                    "access": "owner",
                    "params": {
                        "answers": {
                            "type": "object",
                            "required": true,
                            "description": "Map of question id to selected_option_ids and answer_text"
                        }
                    }
                },
                {
                    "path": "/api/certificates",
                    "method": "GET",
                    "description": "List own certificates",
                    "access": "user",
                    "params": {}
                },
                {
                    "path": "/api/certificates/:id/pdf",
                    "method": "GET",
                    "description": "Certificate PDF",
                    "access": "owner or admin",
                    "params": {}
                },
                {
                    "path": "/api/certificates/verify/:number",
                    "method": "GET",
                    "description": "Verify a certificate number",
                    "access": "public",
                    "params": {}
                },
                {
                    "path": "/api/analytics/overview",
                    "method": "GET",
                    "description": "Platform totals",
                    "access": "admin",
                    "params": {}
                },
                {
                    "path": "/api/analytics/revenue",
                    "method": "GET",
                    "description": "Completed revenue per month",
                    "access": "admin",
                    "params": {
                        "months": {
                            "type": "integer",
                            "required": false,
                            "description": "1 to 36, defaults to 12"
                        }
                    }
                },
                {
                    "path": "/api/analytics/exams/:id",
                    "method": "GET",
                    "description": "Attempt and question statistics of an exam",
                    "access": "staff",
                    "params": {}
                },
                {
                    "path": "/api/analytics/dashboard",
                    "method": "GET",
                    "description": "Personal dashboard",
                    "access": "user",
                    "params": {}
                }
            ]
        })
    });

    Json(value.clone())
}
